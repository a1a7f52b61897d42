//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! storehouse migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREHOUSE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Stored in `crates/api/migrations/` and embedded at compile time.

use super::{CommandError, database_url};

/// Run all pending migrations.
///
/// Uses a plain connection: the migration bookkeeping table lives in the
/// default schema, not in `storehouse`.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    dotenvy::dotenv().ok();
    tracing::info!("Connecting to database...");
    let pool = sqlx::PgPool::connect(&database_url()?).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
