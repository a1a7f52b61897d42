//! Account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use storehouse_core::{AccountId, Email, Phone, Role, Username};

use super::catalog::{Product, Sale};

/// An account of any kind (domain type).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub username: Username,
    /// Absent for admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub email: Email,
    pub phone: Phone,
    /// Absent for admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub role: Role,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An account together with its stored password hash.
///
/// Only produced for sign-in and password changes.
#[derive(Clone)]
pub struct AccountCredentials {
    pub account: Account,
    /// Argon2id PHC string.
    pub password_hash: String,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account", &self.account)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// A salesman with the products they list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesmanDetails {
    #[serde(flatten)]
    pub account: Account,
    pub products: Vec<Product>,
}

/// A client with their purchases.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    #[serde(flatten)]
    pub account: Account,
    pub purchased_products: Vec<Sale>,
}
