//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::email::{LogMailer, Mailer, SmtpMailer};
use crate::services::{
    AuthService, Clock, CodeError, CodeIssuer, MokaCodeStore, SessionTokens, SystemClock,
};

/// Error assembling application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("SMTP setup failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("code issuer setup failed: {0}")]
    Codes(#[from] CodeError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: SessionTokens,
    codes: CodeIssuer,
}

impl AppState {
    /// Create application state with the configured mail transport.
    ///
    /// Without SMTP settings codes are written to the log instead of mailed.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay or the code issuer cannot be set up.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let mailer: Arc<dyn Mailer> = match config.email() {
            Some(email) => Arc::new(SmtpMailer::new(email)?),
            None => {
                tracing::warn!("SMTP not configured, one-time codes will be logged");
                Arc::new(LogMailer)
            }
        };

        Self::with_mailer(config, pool, mailer, Arc::new(SystemClock))
    }

    /// Create application state with an explicit mailer and clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the code issuer cannot be set up.
    pub fn with_mailer(
        config: ApiConfig,
        pool: PgPool,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StateError> {
        let tokens = SessionTokens::new(&config.secrets.token_secret);
        let codes = CodeIssuer::new(
            Arc::new(MokaCodeStore::default()),
            mailer,
            clock,
            &config.secrets.hmac_secret,
        )?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                codes,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the session token signer.
    #[must_use]
    pub fn tokens(&self) -> &SessionTokens {
        &self.inner.tokens
    }

    /// Get a reference to the one-time code issuer.
    #[must_use]
    pub fn codes(&self) -> &CodeIssuer {
        &self.inner.codes
    }

    /// Authentication service bound to this state.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.pool(), self.codes(), self.tokens())
    }
}
