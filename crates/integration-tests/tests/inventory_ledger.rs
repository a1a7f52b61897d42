//! Inventory ledger scenarios: a product's stock across a series of sales,
//! revisions and rejections, replayed the way the sale repository applies
//! them inside its transactions.

use rust_decimal::Decimal;

use storehouse_core::{LedgerError, Price, Stock};

fn price(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2)).unwrap()
}

#[test]
fn test_sale_draws_down_stock_and_fixes_total() {
    let stock = Stock::new(5, price(1_250));

    let line = stock.sell(3).unwrap();

    assert_eq!(line.remaining, 2);
    assert_eq!(line.total_price, Decimal::new(3_750, 2));
}

#[test]
fn test_rejected_sale_leaves_stock_untouched() {
    let stock = Stock::new(2, price(1_000));

    let err = stock.sell(3).unwrap_err();

    assert_eq!(
        err,
        LedgerError::InsufficientStock {
            requested: 3,
            available: 2
        }
    );
    assert_eq!(stock.quantity, 2);
}

#[test]
fn test_exact_stock_can_be_sold_out() {
    let line = Stock::new(4, price(99)).sell(4).unwrap();
    assert_eq!(line.remaining, 0);

    let err = Stock::new(line.remaining, price(99)).sell(1).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }));
}

#[test]
fn test_non_positive_quantities_are_rejected() {
    let stock = Stock::new(10, price(100));
    assert_eq!(stock.sell(0).unwrap_err(), LedgerError::InvalidQuantity(0));
    assert_eq!(stock.sell(-2).unwrap_err(), LedgerError::InvalidQuantity(-2));
}

#[test]
fn test_sequence_of_sales_never_goes_negative() {
    let mut stock = Stock::new(10, price(500));
    let mut sold = 0;

    for quantity in [3, 4, 5, 2, 1, 1] {
        match stock.sell(quantity) {
            Ok(line) => {
                sold += line.quantity;
                stock = Stock::new(line.remaining, stock.price);
            }
            Err(LedgerError::InsufficientStock { available, .. }) => {
                assert_eq!(available, stock.quantity);
            }
            Err(other) => panic!("unexpected {other:?}"),
        }
        assert!(stock.quantity >= 0);
    }

    assert_eq!(sold + stock.quantity, 10);
    assert_eq!(stock.quantity, 0);
}

#[test]
fn test_revision_on_same_product_restores_first() {
    // 6 on hand after a sale of 4 out of 10.
    let after_sale = Stock::new(6, price(200));

    let grown = after_sale.revise(4, 10).unwrap();
    assert_eq!(grown.remaining, 0);
    assert_eq!(grown.total_price, Decimal::new(2_000, 2));

    let shrunk = after_sale.revise(4, 1).unwrap();
    assert_eq!(shrunk.remaining, 9);

    let err = after_sale.revise(4, 11).unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientStock {
            requested: 11,
            available: 10
        }
    );
}

#[test]
fn test_revision_to_other_product_moves_units() {
    // Sale of 3 units of A is moved to B.
    let a = Stock::new(7, price(100));
    let b = Stock::new(5, price(300));

    let line = b.sell(3).unwrap();
    let a = a.restore(3);

    assert_eq!(a.quantity, 10);
    assert_eq!(line.remaining, 2);
    assert_eq!(line.total_price, Decimal::new(900, 2));
}

#[test]
fn test_total_uses_price_at_time_of_sale() {
    let before = Stock::new(10, price(1_000)).sell(2).unwrap();
    let after_price_change = Stock::new(before.remaining, price(1_500)).sell(2).unwrap();

    assert_eq!(before.total_price, Decimal::new(2_000, 2));
    assert_eq!(after_price_change.total_price, Decimal::new(3_000, 2));
}
