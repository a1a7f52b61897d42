//! Database operations for the API.
//!
//! # Schema: `storehouse`
//!
//! ## Tables
//!
//! - `account` - Super admin, admins, salesmen and clients (ids unique across kinds)
//! - `category` - Product categories
//! - `product` - Products with quantity on hand
//! - `sale` - Sold products with the price fixed at sale time
//!
//! Foreign keys are `ON DELETE RESTRICT`; cascades are explicit, ordered
//! deletes inside one transaction so that callers get exact counts.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p storehouse-cli -- migrate
//! ```

pub mod accounts;
pub mod categories;
pub mod products;
pub mod sales;

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use accounts::{AccountChanges, AccountRepository, NewAccount};
pub use categories::{CategoryChanges, CategoryRepository};
pub use products::{NewProduct, ProductChanges, ProductRepository};
pub use sales::{SaleRepository, SaleRevision, SaleWriteError};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique username). Carries the user-facing message.
    #[error("{0}")]
    Conflict(String),
}

/// Rows removed by a cascading delete, besides the target row itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub products: u64,
    pub sold_products: u64,
}

/// Schemas searched for unqualified names on every connection.
///
/// Enum types such as `account_role` are matched by their bare name when
/// rows are decoded, and bound parameters are resolved the same way.
pub const SEARCH_PATH: &str = "storehouse, public";

/// Pool options shared by the server, the CLI and the tests.
///
/// Every new connection gets [`SEARCH_PATH`].
#[must_use]
pub fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(10))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET search_path TO {SEARCH_PATH}"))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    pool_options()
        .max_connections(10)
        .min_connections(2)
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to `Conflict` with the message registered for its
/// constraint. Anything else stays a database error.
fn map_unique_violation(e: sqlx::Error, messages: &[(&str, &str)]) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let constraint = db_err.constraint().unwrap_or_default();
        let message = messages
            .iter()
            .find(|(name, _)| *name == constraint)
            .or_else(|| messages.first())
            .map_or("already exists", |(_, message)| message);
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Group rows by a key, preserving row order within each group.
fn group_by<K, V>(rows: Vec<V>, key: impl Fn(&V) -> K) -> HashMap<K, Vec<V>>
where
    K: Eq + Hash,
{
    let mut groups: HashMap<K, Vec<V>> = HashMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_preserves_order() {
        let rows = vec![(1, "a"), (2, "b"), (1, "c")];
        let groups = group_by(rows, |row| row.0);
        assert_eq!(groups[&1], vec![(1, "a"), (1, "c")]);
        assert_eq!(groups[&2], vec![(2, "b")]);
    }

    #[test]
    fn test_non_unique_errors_stay_database_errors() {
        let err = map_unique_violation(sqlx::Error::RowNotFound, &[("x", "X exists")]);
        assert!(matches!(err, RepositoryError::Database(_)));
    }

    #[test]
    fn test_conflict_displays_message() {
        let err = RepositoryError::Conflict("Username is already taken".to_owned());
        assert_eq!(err.to_string(), "Username is already taken");
    }
}
