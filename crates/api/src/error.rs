//! Unified error handling for the API.
//!
//! Every failure leaves as the JSON envelope `{statusCode, message}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use storehouse_core::{AccessDenied, EmailError, FieldError, LedgerError};

use crate::db::{RepositoryError, SaleWriteError};
use crate::response::ApiResponse;
use crate::services::AuthError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request body or query failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness or stock conflict.
    #[error("{0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller lacks permission.
    #[error("{0}")]
    Forbidden(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A 401 with the uniform message.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::Unauthorized("Unauthorized user".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(ApiResponse::<()>::message(status, message))).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::NotFound => Self::NotFound("Not found".to_string()),
            other => Self::Database(other),
        }
    }
}

impl From<SaleWriteError> for AppError {
    fn from(err: SaleWriteError) -> Self {
        match err {
            SaleWriteError::UnknownProduct | SaleWriteError::UnknownClient => {
                Self::BadRequest(err.to_string())
            }
            SaleWriteError::NotFound => Self::NotFound(err.to_string()),
            SaleWriteError::Stock(e) => e.into(),
            SaleWriteError::Repository(e) => e.into(),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self::Conflict(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::NotDelivered(ref source) => {
                tracing::warn!(error = %source, "Code delivery failed");
                Self::BadRequest(err.to_string())
            }
            AuthError::UnknownAccount(_)
            | AuthError::CodeRejected
            | AuthError::AlreadyVerified
            | AuthError::SamePassword
            | AuthError::WrongOldPassword => Self::BadRequest(err.to_string()),
            AuthError::Repository(e) => e.into(),
            AuthError::PasswordHash | AuthError::Token(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        Self::Validation(format!("\"email\" {err}"))
    }
}

impl From<AccessDenied> for AppError {
    fn from(err: AccessDenied) -> Self {
        Self::Forbidden(err.to_string())
    }
}

/// Set the Sentry user context for an authenticated caller.
pub fn set_sentry_user(account_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(account_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
