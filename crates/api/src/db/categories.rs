//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use storehouse_core::CategoryId;

use super::{CascadeReport, RepositoryError, group_by, map_unique_violation};
use crate::models::{Category, CategoryDetails};

const CATEGORY_CONFLICTS: &[(&str, &str)] = &[("category_name_key", "Category already exists")];

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Partial update of a category.
#[derive(Debug, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, name: &str, description: &str) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO storehouse.category (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            ",
        )
        .bind(name)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, CATEGORY_CONFLICTS))?;

        Ok(row.into())
    }

    /// List all categories, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, description, created_at, updated_at
            FROM storehouse.category
            ORDER BY id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List categories by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_ids(&self, ids: &[CategoryId]) -> Result<Vec<Category>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(CategoryId::as_i32).collect();
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, description, created_at, updated_at
            FROM storehouse.category
            WHERE id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, description, created_at, updated_at
            FROM storehouse.category
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
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        changes: &CategoryChanges,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            UPDATE storehouse.category
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, CATEGORY_CONFLICTS))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a category, its products and their sales in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<CascadeReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sold_products = sqlx::query(
            r"
            DELETE FROM storehouse.sale
            WHERE product_id IN (
                SELECT id FROM storehouse.product WHERE category_id = $1
            )
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let products = sqlx::query(
            r"
            DELETE FROM storehouse.product WHERE category_id = $1
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let deleted = sqlx::query(
            r"
            DELETE FROM storehouse.category WHERE id = $1
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

        tracing::info!(category_id = %id, products, sold_products, "Category deleted");

        Ok(CascadeReport {
            products,
            sold_products,
        })
    }

    /// Attach each category's products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn with_products(
        &self,
        categories: Vec<Category>,
    ) -> Result<Vec<CategoryDetails>, RepositoryError> {
        let ids: Vec<CategoryId> = categories.iter().map(|c| c.id).collect();
        let products = super::ProductRepository::new(self.pool)
            .list_by_categories(&ids)
            .await?;
        let mut by_category = group_by(products, |p| p.category_id);

        Ok(categories
            .into_iter()
            .map(|category| CategoryDetails {
                products: by_category.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect())
    }
}
