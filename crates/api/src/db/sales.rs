//! Sale repository: the persistent half of the inventory ledger.
//!
//! Recording or revising a sale locks the affected product rows with
//! `SELECT ... FOR UPDATE`, asks [`Stock`] for the outcome and writes the new
//! quantity and the sale in the same transaction. Concurrent sales of one
//! product therefore serialize, and a rejected sale changes nothing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use storehouse_core::{AccountId, LedgerError, ProductId, SaleId, Stock};

use super::products::ProductRow;
use super::{RepositoryError, group_by};
use crate::models::{Sale, SaleDetails};

/// Errors from recording, revising or deleting a sale.
#[derive(Debug, Error)]
pub enum SaleWriteError {
    #[error("Product does not exist")]
    UnknownProduct,

    #[error("Client does not exist")]
    UnknownClient,

    #[error("Sold product not found")]
    NotFound,

    #[error(transparent)]
    Stock(#[from] LedgerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for SaleWriteError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: SaleId,
    product_id: ProductId,
    client_id: AccountId,
    quantity: i32,
    total_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            client_id: row.client_id,
            quantity: row.quantity,
            total_price: row.total_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Requested changes to a sale. `None` keeps the current value.
#[derive(Debug, Default, Clone, Copy)]
pub struct SaleRevision {
    pub product_id: Option<ProductId>,
    pub client_id: Option<AccountId>,
    pub quantity: Option<i32>,
}

/// Repository for sale database operations.
pub struct SaleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SaleRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a sale of `quantity` units of a product to a client.
    ///
    /// Decrements the product's quantity and fixes the total price, all in
    /// one transaction.
    ///
    /// # Errors
    ///
    /// Returns `SaleWriteError::UnknownProduct` / `UnknownClient` if either
    /// reference is missing, and `SaleWriteError::Stock` if the quantity is not
    /// positive or exceeds the stock. In every error case the product is left
    /// unchanged.
    pub async fn record(
        &self,
        product_id: ProductId,
        client_id: AccountId,
        quantity: i32,
    ) -> Result<Sale, SaleWriteError> {
        let mut tx = self.pool.begin().await?;

        let product = lock_product(&mut tx, product_id)
            .await?
            .ok_or(SaleWriteError::UnknownProduct)?;
        ensure_client(&mut tx, client_id).await?;

        let line = Stock::new(product.quantity, product.price).sell(quantity)?;

        set_quantity(&mut tx, product_id, line.remaining).await?;

        let row = sqlx::query_as::<_, SaleRow>(
            r"
            INSERT INTO storehouse.sale (product_id, client_id, quantity, total_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, product_id, client_id, quantity, total_price, created_at, updated_at
            ",
        )
        .bind(product_id)
        .bind(client_id)
        .bind(line.quantity)
        .bind(line.total_price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            sale_id = %row.id,
            product_id = %product_id,
            quantity = line.quantity,
            remaining = line.remaining,
            "Sale recorded"
        );

        Ok(row.into())
    }

    /// Revise a sale's product, client or quantity.
    ///
    /// The original reservation is returned to the original product before
    /// the (possibly different) target product is checked, so a sale can grow
    /// into its own units. The total price is recomputed at the target
    /// product's current price.
    ///
    /// # Errors
    ///
    /// Returns `SaleWriteError::NotFound` if the sale does not exist, otherwise
    /// as [`Self::record`]. Nothing changes on error.
    pub async fn revise(
        &self,
        id: SaleId,
        revision: SaleRevision,
    ) -> Result<Sale, SaleWriteError> {
        let mut tx = self.pool.begin().await?;

        let sale = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT id, product_id, client_id, quantity, total_price, created_at, updated_at
            FROM storehouse.sale
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(SaleWriteError::NotFound)?;

        let target_id = revision.product_id.unwrap_or(sale.product_id);
        let client_id = revision.client_id.unwrap_or(sale.client_id);
        let quantity = revision.quantity.unwrap_or(sale.quantity);

        if client_id != sale.client_id {
            ensure_client(&mut tx, client_id).await?;
        }

        let line = if target_id == sale.product_id {
            let product = lock_product(&mut tx, target_id)
                .await?
                .ok_or(SaleWriteError::UnknownProduct)?;
            let line = Stock::new(product.quantity, product.price).revise(sale.quantity, quantity)?;
            set_quantity(&mut tx, target_id, line.remaining).await?;
            line
        } else {
            // Lock in id order so two revisions moving units in opposite
            // directions cannot deadlock.
            let (first, second) = if sale.product_id.as_i32() < target_id.as_i32() {
                (sale.product_id, target_id)
            } else {
                (target_id, sale.product_id)
            };
            let first_row = lock_product(&mut tx, first).await?;
            let second_row = lock_product(&mut tx, second).await?;
            let (original, target) = if first == sale.product_id {
                (first_row, second_row)
            } else {
                (second_row, first_row)
            };

            let target = target.ok_or(SaleWriteError::UnknownProduct)?;
            let line = Stock::new(target.quantity, target.price).sell(quantity)?;

            if let Some(original) = original {
                let restored = Stock::new(original.quantity, original.price).restore(sale.quantity);
                set_quantity(&mut tx, sale.product_id, restored.quantity).await?;
            }
            set_quantity(&mut tx, target_id, line.remaining).await?;
            line
        };

        let row = sqlx::query_as::<_, SaleRow>(
            r"
            UPDATE storehouse.sale
            SET product_id = $2,
                client_id = $3,
                quantity = $4,
                total_price = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, product_id, client_id, quantity, total_price, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(target_id)
        .bind(client_id)
        .bind(line.quantity)
        .bind(line.total_price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            sale_id = %id,
            product_id = %target_id,
            quantity = line.quantity,
            remaining = line.remaining,
            "Sale revised"
        );

        Ok(row.into())
    }

    /// Delete a sale. Stock is not restored.
    ///
    /// # Errors
    ///
    /// Returns `SaleWriteError::NotFound` if the sale does not exist.
    pub async fn delete(&self, id: SaleId) -> Result<(), SaleWriteError> {
        let deleted = sqlx::query(
            r"
            DELETE FROM storehouse.sale WHERE id = $1
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Err(SaleWriteError::NotFound);
        }
        Ok(())
    }

    /// List all sales, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Sale>, RepositoryError> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT id, product_id, client_id, quantity, total_price, created_at, updated_at
            FROM storehouse.sale
            ORDER BY id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a sale by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: SaleId) -> Result<Option<Sale>, RepositoryError> {
        let row = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT id, product_id, client_id, quantity, total_price, created_at, updated_at
            FROM storehouse.sale
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List the sales of any of the given products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_products(&self, ids: &[ProductId]) -> Result<Vec<Sale>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT id, product_id, client_id, quantity, total_price, created_at, updated_at
            FROM storehouse.sale
            WHERE product_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List the purchases of any of the given clients.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_clients(&self, ids: &[AccountId]) -> Result<Vec<Sale>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(AccountId::as_i32).collect();
        let rows = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT id, product_id, client_id, quantity, total_price, created_at, updated_at
            FROM storehouse.sale
            WHERE client_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Expand product and client for each sale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if a referenced row is missing.
    pub async fn with_details(&self, sales: Vec<Sale>) -> Result<Vec<SaleDetails>, RepositoryError> {
        let product_ids: Vec<ProductId> = sales.iter().map(|s| s.product_id).collect();
        let client_ids: Vec<AccountId> = sales.iter().map(|s| s.client_id).collect();

        let products = super::ProductRepository::new(self.pool)
            .list_by_ids(&product_ids)
            .await?;
        let clients = super::AccountRepository::new(self.pool)
            .list_by_ids(&client_ids)
            .await?;
        let products = group_by(products, |p| p.id);
        let clients = group_by(clients, |c| c.id);

        sales
            .into_iter()
            .map(|sale| {
                let product = products
                    .get(&sale.product_id)
                    .and_then(|p| p.first())
                    .cloned()
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "sale {} references missing product {}",
                            sale.id, sale.product_id
                        ))
                    })?;
                let client = clients
                    .get(&sale.client_id)
                    .and_then(|c| c.first())
                    .cloned()
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "sale {} references missing client {}",
                            sale.id, sale.client_id
                        ))
                    })?;

                Ok(SaleDetails {
                    sale,
                    product,
                    client,
                })
            })
            .collect()
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Lock a product row for the rest of the transaction.
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    id: ProductId,
) -> Result<Option<ProductRow>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, name, description, price, quantity, color, category_id,
               salesman_id, created_at, updated_at
        FROM storehouse.product
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

/// Fail with `UnknownClient` unless a client account has this id.
async fn ensure_client(
    tx: &mut Transaction<'_, Postgres>,
    id: AccountId,
) -> Result<(), SaleWriteError> {
    let exists = sqlx::query_scalar::<_, bool>(
        r"
        SELECT EXISTS (
            SELECT 1 FROM storehouse.account WHERE id = $1 AND role = 'client'
        )
        ",
    )
    .bind(id)
    .fetch_one(&mut **tx)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(SaleWriteError::UnknownClient)
    }
}

async fn set_quantity(
    tx: &mut Transaction<'_, Postgres>,
    id: ProductId,
    quantity: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE storehouse.product
        SET quantity = $2, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
