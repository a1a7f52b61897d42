//! Session tokens.
//!
//! Sessions are HS256 JWTs carrying the account's id, email, role and
//! verification flag. Lifetime depends on the role (see
//! [`Role::session_lifetime`](storehouse_core::Role::session_lifetime)).

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storehouse_core::{AccountId, Email, Role};

use crate::models::{Account, CurrentAccount};

/// Errors from issuing or verifying session tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("session lifetime out of range")]
    Lifetime,
}

/// JWT claims of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: AccountId,
    pub email: Email,
    pub role: Role,
    pub verified: bool,
    pub iat: i64,
    pub exp: i64,
}

impl From<Claims> for CurrentAccount {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            role: claims.role,
            verified: claims.verified,
        }
    }
}

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionTokens {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
        }
    }

    /// Issue a session for `account`, valid for its role's lifetime.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if signing fails.
    pub fn issue(&self, account: &Account) -> Result<IssuedSession, TokenError> {
        let now = Utc::now();
        let lifetime = chrono::Duration::from_std(account.role.session_lifetime())
            .map_err(|_| TokenError::Lifetime)?;
        let expires_at = now + lifetime;

        let claims = Claims {
            id: account.id,
            email: account.email.clone(),
            role: account.role,
            verified: account.verified,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;

        Ok(IssuedSession { token, expires_at })
    }

    /// Verify a token and return the caller it identifies.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Jwt` for bad signatures, malformed or expired tokens.
    pub fn verify(&self, token: &str) -> Result<CurrentAccount, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims.into())
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("keys", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use storehouse_core::{Phone, Username};

    use super::*;

    fn tokens(secret: &str) -> SessionTokens {
        SessionTokens::new(&SecretString::from(secret))
    }

    fn account(role: Role) -> Account {
        Account {
            id: AccountId::new(7),
            username: Username::parse("salesman1").unwrap(),
            full_name: Some("Test Salesman".to_owned()),
            email: Email::parse("salesman@example.com").unwrap(),
            phone: Phone::parse("+998901234567").unwrap(),
            address: Some("Tashkent".to_owned()),
            role,
            verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = tokens("session-signing-key-for-unit-tests-x7Qp");
        let session = tokens.issue(&account(Role::Salesman)).unwrap();

        let caller = tokens.verify(&session.token).unwrap();
        assert_eq!(caller.id, AccountId::new(7));
        assert_eq!(caller.role, Role::Salesman);
        assert_eq!(caller.email.as_str(), "salesman@example.com");
        assert!(caller.verified);
    }

    #[test]
    fn test_lifetime_follows_role() {
        let tokens = tokens("session-signing-key-for-unit-tests-x7Qp");
        let admin = tokens.issue(&account(Role::Admin)).unwrap();
        let client = tokens.issue(&account(Role::Client)).unwrap();

        let admin_minutes = (admin.expires_at - Utc::now()).num_minutes();
        let client_minutes = (client.expires_at - Utc::now()).num_minutes();
        assert!((119..=120).contains(&admin_minutes));
        assert!((239..=240).contains(&client_minutes));
    }

    #[test]
    fn test_rejects_foreign_signature() {
        let issued = tokens("session-signing-key-for-unit-tests-x7Qp")
            .issue(&account(Role::Client))
            .unwrap();
        assert!(
            tokens("another-signing-key-for-unit-tests-9Lm")
                .verify(&issued.token)
                .is_err()
        );
    }

    #[test]
    fn test_rejects_expired_token() {
        let secret = "session-signing-key-for-unit-tests-x7Qp";
        let past = Utc::now() - chrono::Duration::hours(5);
        let claims = Claims {
            id: AccountId::new(1),
            email: Email::parse("client@example.com").unwrap(),
            role: Role::Client,
            verified: false,
            iat: past.timestamp(),
            exp: (past + chrono::Duration::hours(4)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(tokens(secret).verify(&token).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(tokens("session-signing-key-for-unit-tests-x7Qp").verify("not.a.jwt").is_err());
    }
}
