//! Stock arithmetic for recording and revising sales.
//!
//! The functions here decide whether a sale fits the stock on hand and what
//! the product's quantity becomes afterwards. They do no I/O: the API crate
//! loads the product rows under a lock, asks [`Stock`] for the outcome and
//! writes it back in the same transaction.

use rust_decimal::Decimal;

use crate::types::Price;

/// Errors from stock arithmetic.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The requested quantity exceeds what is available.
    #[error("Sold product quantity is more than available product quantity")]
    InsufficientStock {
        /// Quantity the caller asked for.
        requested: i32,
        /// Quantity available for this sale.
        available: i32,
    },

    /// Sale quantities must be positive.
    #[error("\"quantity\" must be greater than or equal to 1")]
    InvalidQuantity(i32),
}

/// Quantity on hand and unit price of a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stock {
    /// Units currently available.
    pub quantity: i32,
    /// Unit price at the time of the transaction.
    pub price: Price,
}

/// Outcome of a successful sale against a [`Stock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleLine {
    /// Units sold.
    pub quantity: i32,
    /// `quantity * price`, fixed at the moment of the sale.
    pub total_price: Decimal,
    /// Product quantity after the sale.
    pub remaining: i32,
}

impl Stock {
    #[must_use]
    pub const fn new(quantity: i32, price: Price) -> Self {
        Self { quantity, price }
    }

    /// Sell `quantity` units.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidQuantity`] for non-positive quantities and
    /// [`LedgerError::InsufficientStock`] if fewer than `quantity` units are on
    /// hand.
    pub fn sell(&self, quantity: i32) -> Result<SaleLine, LedgerError> {
        if quantity < 1 {
            return Err(LedgerError::InvalidQuantity(quantity));
        }
        if quantity > self.quantity {
            return Err(LedgerError::InsufficientStock {
                requested: quantity,
                available: self.quantity,
            });
        }

        Ok(SaleLine {
            quantity,
            total_price: self.price.total_for(quantity),
            remaining: self.quantity - quantity,
        })
    }

    /// Return `reserved` units previously taken by a sale.
    #[must_use]
    pub const fn restore(self, reserved: i32) -> Self {
        Self {
            quantity: self.quantity.saturating_add(reserved),
            price: self.price,
        }
    }

    /// Re-price an existing sale of `reserved` units on this same product at
    /// `new_quantity` units.
    ///
    /// The prior reservation is restored before validating, so a sale can be
    /// revised upward against its own units.
    ///
    /// # Errors
    ///
    /// Same as [`Stock::sell`], evaluated against the restored quantity.
    pub fn revise(&self, reserved: i32, new_quantity: i32) -> Result<SaleLine, LedgerError> {
        self.restore(reserved).sell(new_quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stock(quantity: i32, price: i64) -> Stock {
        Stock::new(quantity, Price::new(Decimal::from(price)).unwrap())
    }

    #[test]
    fn test_sell_computes_total_and_remaining() {
        let line = stock(10, 5).sell(4).unwrap();
        assert_eq!(line.quantity, 4);
        assert_eq!(line.total_price, Decimal::from(20));
        assert_eq!(line.remaining, 6);
    }

    #[test]
    fn test_sell_exact_quantity_leaves_zero() {
        let line = stock(7, 3).sell(7).unwrap();
        assert_eq!(line.remaining, 0);
        assert_eq!(line.total_price, Decimal::from(21));
    }

    #[test]
    fn test_oversell_rejected() {
        let err = stock(3, 5).sell(4).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                requested: 4,
                available: 3
            }
        );
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        assert_eq!(stock(3, 5).sell(0), Err(LedgerError::InvalidQuantity(0)));
        assert_eq!(stock(3, 5).sell(-2), Err(LedgerError::InvalidQuantity(-2)));
    }

    #[test]
    fn test_revise_upward_within_restored_stock() {
        // 10 on hand, sold 4 -> 6 left; revising to 7 sees 6 + 4 = 10.
        let after_sale = stock(6, 5);
        let line = after_sale.revise(4, 7).unwrap();
        assert_eq!(line.remaining, 3);
        assert_eq!(line.total_price, Decimal::from(35));
    }

    #[test]
    fn test_revise_beyond_restored_stock_rejected() {
        let after_sale = stock(6, 5);
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
    fn test_revise_downward() {
        let line = stock(6, 5).revise(4, 1).unwrap();
        assert_eq!(line.remaining, 9);
    }
}
