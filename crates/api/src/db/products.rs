//! Product repository.
//!
//! Quantity on hand is changed here only by explicit product updates; sales
//! go through [`super::SaleRepository`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use storehouse_core::{AccountId, AccountKind, CategoryId, Price, ProductId};

use super::{CascadeReport, RepositoryError, group_by, map_unique_violation};
use crate::models::{Product, ProductDetails};

const PRODUCT_CONFLICTS: &[(&str, &str)] = &[("product_name_key", "Product already exists")];

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
    pub(super) id: ProductId,
    pub(super) name: String,
    pub(super) description: String,
    pub(super) price: Price,
    pub(super) quantity: i32,
    pub(super) color: String,
    pub(super) category_id: CategoryId,
    pub(super) salesman_id: AccountId,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            quantity: row.quantity,
            color: row.color,
            category_id: row.category_id,
            salesman_id: row.salesman_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields for a new product.
#[derive(Debug)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub price: Price,
    pub quantity: i32,
    pub color: &'a str,
    pub category_id: CategoryId,
    pub salesman_id: AccountId,
}

/// Partial update of a product.
#[derive(Debug, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub quantity: Option<i32>,
    pub color: Option<String>,
    pub category_id: Option<CategoryId>,
    pub salesman_id: Option<AccountId>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, new: &NewProduct<'_>) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO storehouse.product
                (name, description, price, quantity, color, category_id, salesman_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, description, price, quantity, color, category_id,
                      salesman_id, created_at, updated_at
            ",
        )
        .bind(new.name)
        .bind(new.description)
        .bind(new.price)
        .bind(new.quantity)
        .bind(new.color)
        .bind(new.category_id)
        .bind(new.salesman_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, PRODUCT_CONFLICTS))?;

        Ok(row.into())
    }

    /// List all products, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, quantity, color, category_id,
                   salesman_id, created_at, updated_at
            FROM storehouse.product
            ORDER BY id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List products by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, quantity, color, category_id,
                   salesman_id, created_at, updated_at
            FROM storehouse.product
            WHERE id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List the products in any of the given categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_categories(
        &self,
        ids: &[CategoryId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(CategoryId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, quantity, color, category_id,
                   salesman_id, created_at, updated_at
            FROM storehouse.product
            WHERE category_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List the products owned by any of the given salesmen.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_salesmen(
        &self,
        ids: &[AccountId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(AccountId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, quantity, color, category_id,
                   salesman_id, created_at, updated_at
            FROM storehouse.product
            WHERE salesman_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, quantity, color, category_id,
                   salesman_id, created_at, updated_at
            FROM storehouse.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE storehouse.product
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                quantity = COALESCE($5, quantity),
                color = COALESCE($6, color),
                category_id = COALESCE($7, category_id),
                salesman_id = COALESCE($8, salesman_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, price, quantity, color, category_id,
                      salesman_id, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price)
        .bind(changes.quantity)
        .bind(changes.color.as_deref())
        .bind(changes.category_id)
        .bind(changes.salesman_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, PRODUCT_CONFLICTS))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product and its sales in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<CascadeReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sold_products = sqlx::query(
            r"
            DELETE FROM storehouse.sale WHERE product_id = $1
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let deleted = sqlx::query(
            r"
            DELETE FROM storehouse.product WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;

        tracing::info!(product_id = %id, sold_products, "Product deleted");

        Ok(CascadeReport {
            products: deleted,
            sold_products,
        })
    }

    /// Expand category, salesman and sales for each product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if a referenced row is missing.
    pub async fn with_details(
        &self,
        products: Vec<Product>,
    ) -> Result<Vec<ProductDetails>, RepositoryError> {
        let product_ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        let category_ids: Vec<_> = products.iter().map(|p| p.category_id).collect();
        let salesman_ids: Vec<_> = products.iter().map(|p| p.salesman_id).collect();

        let categories = super::CategoryRepository::new(self.pool)
            .list_by_ids(&category_ids)
            .await?;
        let salesmen = super::AccountRepository::new(self.pool)
            .list_by_ids(&salesman_ids)
            .await?;
        let sales = super::SaleRepository::new(self.pool)
            .list_by_products(&product_ids)
            .await?;
        let mut sales_by_product = group_by(sales, |s| s.product_id);

        products
            .into_iter()
            .map(|product| {
                let category = categories
                    .iter()
                    .find(|c| c.id == product.category_id)
                    .cloned()
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "product {} references missing category {}",
                            product.id, product.category_id
                        ))
                    })?;
                let salesman = salesmen
                    .iter()
                    .find(|s| s.id == product.salesman_id && s.role.kind() == AccountKind::Salesman)
                    .cloned()
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "product {} references missing salesman {}",
                            product.id, product.salesman_id
                        ))
                    })?;

                Ok(ProductDetails {
                    sold_products: sales_by_product.remove(&product.id).unwrap_or_default(),
                    category,
                    salesman,
                    product,
                })
            })
            .collect()
    }
}
