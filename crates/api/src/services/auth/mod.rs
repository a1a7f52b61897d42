//! Authentication service.
//!
//! Sign-in is two-step: a correct username and password make the service
//! mail a one-time code, and only the code is exchanged for a session.
//! The same code issuer backs account verification and password resets.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use storehouse_core::{AccountKind, Email, Password, Phone, Role, Username};

use crate::db::{AccountRepository, NewAccount};
use crate::models::{Account, CurrentAccount};
use crate::services::codes::CodeIssuer;
use crate::services::email::CodePurpose;
use crate::services::tokens::{IssuedSession, SessionTokens};

/// Fields for registering an account of any kind.
#[derive(Debug)]
pub struct Registration<'a> {
    pub username: &'a Username,
    pub full_name: Option<&'a str>,
    pub email: &'a Email,
    pub phone: &'a Phone,
    pub address: Option<&'a str>,
    pub role: Role,
    pub password: &'a Password,
}

/// Authentication service.
///
/// Handles registration, two-step sign-in, verification and password changes.
pub struct AuthService<'a> {
    accounts: AccountRepository<'a>,
    codes: &'a CodeIssuer,
    tokens: &'a SessionTokens,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, codes: &'a CodeIssuer, tokens: &'a SessionTokens) -> Self {
        Self {
            accounts: AccountRepository::new(pool),
            codes,
            tokens,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Hash the password and create the account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` with a `Conflict` if the username, email
    /// or phone is taken, or a second super admin is requested.
    pub async fn register(&self, new: &Registration<'_>) -> Result<Account, AuthError> {
        let password_hash = hash_password(new.password.expose())?;

        let account = self
            .accounts
            .create(&NewAccount {
                username: new.username,
                full_name: new.full_name,
                email: new.email,
                phone: new.phone,
                address: new.address,
                role: new.role,
                password_hash: &password_hash,
            })
            .await?;

        tracing::info!(account_id = %account.id, role = %account.role, "Account created");
        Ok(account)
    }

    // =========================================================================
    // Sign-in
    // =========================================================================

    /// Check the password and mail a sign-in code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown username or a
    /// wrong password, `AuthError::NotDelivered` if the code was not sent.
    #[tracing::instrument(skip(self, password), fields(username = %username))]
    pub async fn begin_sign_in(
        &self,
        kind: AccountKind,
        username: &Username,
        password: &str,
    ) -> Result<(), AuthError> {
        let credentials = self
            .accounts
            .get_credentials_by_username(kind, username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &credentials.password_hash)?;

        self.codes
            .issue(&credentials.account.email, CodePurpose::SignIn)
            .await?;

        Ok(())
    }

    /// Exchange a sign-in code for a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownAccount` for an unknown username and
    /// `AuthError::CodeRejected` if the code does not match.
    #[tracing::instrument(skip(self, code), fields(username = %username))]
    pub async fn complete_sign_in(
        &self,
        kind: AccountKind,
        username: &Username,
        code: u64,
    ) -> Result<IssuedSession, AuthError> {
        let credentials = self
            .accounts
            .get_credentials_by_username(kind, username)
            .await?
            .ok_or(AuthError::UnknownAccount(kind))?;

        if !self.codes.confirm(&credentials.account.email, code).await {
            return Err(AuthError::CodeRejected);
        }

        let session = self.tokens.issue(&credentials.account)?;
        tracing::info!(account_id = %credentials.account.id, "Signed in");
        Ok(session)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Mail a verification code to the caller.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AlreadyVerified` if the account is verified.
    #[tracing::instrument(skip(self), fields(account_id = %caller.id))]
    pub async fn request_verification(&self, caller: &CurrentAccount) -> Result<(), AuthError> {
        let account = self.current(caller).await?;
        if account.verified {
            return Err(AuthError::AlreadyVerified);
        }

        self.codes
            .issue(&account.email, CodePurpose::Verification)
            .await?;
        Ok(())
    }

    /// Mark the caller verified if the code matches.
    ///
    /// A verified account is turned away before the code is looked at, so a
    /// pending sign-in or reset code for the same address stays usable.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AlreadyVerified` if the account is verified and
    /// `AuthError::CodeRejected` if the code does not match.
    #[tracing::instrument(skip(self, code), fields(account_id = %caller.id))]
    pub async fn confirm_verification(
        &self,
        caller: &CurrentAccount,
        code: u64,
    ) -> Result<(), AuthError> {
        let account = self.current(caller).await?;
        if account.verified {
            return Err(AuthError::AlreadyVerified);
        }

        if !self.codes.confirm(&account.email, code).await {
            return Err(AuthError::CodeRejected);
        }

        if !self.accounts.mark_verified(account.id).await? {
            return Err(AuthError::AlreadyVerified);
        }

        tracing::info!("Account verified");
        Ok(())
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Replace the caller's password after checking the old one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SamePassword` if both passwords are equal and
    /// `AuthError::WrongOldPassword` if the old password does not verify.
    #[tracing::instrument(skip_all, fields(account_id = %caller.id))]
    pub async fn change_password(
        &self,
        caller: &CurrentAccount,
        old_password: &str,
        new_password: &Password,
    ) -> Result<Account, AuthError> {
        let kind = caller.role.kind();
        let credentials = self
            .accounts
            .get_credentials_by_id(kind, caller.id)
            .await?
            .ok_or(AuthError::UnknownAccount(kind))?;

        if old_password == new_password.expose() {
            return Err(AuthError::SamePassword);
        }

        verify_password(old_password, &credentials.password_hash)
            .map_err(|_| AuthError::WrongOldPassword)?;

        let password_hash = hash_password(new_password.expose())?;
        self.accounts
            .set_password_hash(credentials.account.id, &password_hash)
            .await?;

        tracing::info!("Password changed");
        Ok(credentials.account)
    }

    /// Mail a password reset code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownAccount` if no account of this kind uses the
    /// address.
    #[tracing::instrument(skip(self), fields(email = %email))]
    pub async fn send_reset_code(&self, kind: AccountKind, email: &Email) -> Result<(), AuthError> {
        let account = self
            .accounts
            .get_by_email(kind, email)
            .await?
            .ok_or(AuthError::UnknownAccount(kind))?;

        self.codes
            .issue(&account.email, CodePurpose::PasswordReset)
            .await?;
        Ok(())
    }

    /// Set a new password if the reset code matches.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CodeRejected` if the code does not match.
    #[tracing::instrument(skip(self, code, new_password), fields(email = %email))]
    pub async fn reset_password(
        &self,
        kind: AccountKind,
        email: &Email,
        code: u64,
        new_password: &Password,
    ) -> Result<Account, AuthError> {
        let account = self
            .accounts
            .get_by_email(kind, email)
            .await?
            .ok_or(AuthError::UnknownAccount(kind))?;

        if !self.codes.confirm(&account.email, code).await {
            return Err(AuthError::CodeRejected);
        }

        let password_hash = hash_password(new_password.expose())?;
        self.accounts
            .set_password_hash(account.id, &password_hash)
            .await?;

        tracing::info!(account_id = %account.id, "Password reset");
        Ok(account)
    }

    async fn current(&self, caller: &CurrentAccount) -> Result<Account, AuthError> {
        let kind = caller.role.kind();
        self.accounts
            .get_by_id(kind, caller.id)
            .await?
            .ok_or(AuthError::UnknownAccount(kind))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Secret#123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secret#123", &hash).is_ok());
    }

    #[test]
    fn test_wrong_password_is_invalid_credentials() {
        let hash = hash_password("Secret#123").unwrap();
        assert!(matches!(
            verify_password("Secret#124", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_malformed_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("Secret#123", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("Secret#123").unwrap();
        let b = hash_password("Secret#123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_account_message() {
        assert_eq!(
            AuthError::UnknownAccount(AccountKind::Salesman).to_string(),
            "Salesman does not exist"
        );
    }
}
