pub mod migrate;
pub mod superadmin;

use thiserror::Error;

/// Errors shared by the CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error(transparent)]
    Repository(#[from] storehouse_api::db::RepositoryError),

    #[error(transparent)]
    Auth(#[from] storehouse_api::services::AuthError),
}

impl From<storehouse_core::FieldError> for CommandError {
    fn from(err: storehouse_core::FieldError) -> Self {
        Self::InvalidField {
            field: err.field,
            reason: err.reason,
        }
    }
}

/// Read a required environment variable.
pub fn required_env(name: &'static str) -> Result<String, CommandError> {
    std::env::var(name).map_err(|_| CommandError::MissingEnvVar(name))
}

/// `STOREHOUSE_DATABASE_URL`, falling back to `DATABASE_URL`.
pub fn database_url() -> Result<String, CommandError> {
    std::env::var("STOREHOUSE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("STOREHOUSE_DATABASE_URL"))
}

/// Connect with the API's pool settings, so account roles decode the same
/// way they do in the server.
pub async fn connect() -> Result<sqlx::PgPool, CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = storehouse_api::db::pool_options()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    Ok(pool)
}
