//! Session identity carried by authenticated requests.

use serde::{Deserialize, Serialize};

use storehouse_core::{AccountId, Email, Role};

/// The caller of an authenticated request, as asserted by their session token.
///
/// Reflects the account at sign-in time; `verified` is not refreshed until the
/// next sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAccount {
    pub id: AccountId,
    pub email: Email,
    pub role: Role,
    pub verified: bool,
}
