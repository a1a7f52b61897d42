//! Authentication error types.

use thiserror::Error;

use storehouse_core::AccountKind;

use crate::db::RepositoryError;
use crate::services::codes::CodeError;
use crate::services::tokens::TokenError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password. Deliberately undifferentiated.
    #[error("Username or password incorrect")]
    InvalidCredentials,

    /// No account of this kind for the given identity.
    #[error("{} does not exist", .0.label())]
    UnknownAccount(AccountKind),

    /// Provided code is missing, expired or wrong.
    #[error("Verification code expired")]
    CodeRejected,

    /// The code could not be delivered.
    #[error("Failed to send code")]
    NotDelivered(#[source] CodeError),

    #[error("You are already verified")]
    AlreadyVerified,

    #[error("New password cannot be the same")]
    SamePassword,

    #[error("Old password is incorrect")]
    WrongOldPassword,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Session could not be issued.
    #[error("session error: {0}")]
    Token(#[from] TokenError),
}

impl From<CodeError> for AuthError {
    fn from(err: CodeError) -> Self {
        Self::NotDelivered(err)
    }
}
