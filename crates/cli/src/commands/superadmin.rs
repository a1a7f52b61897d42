//! Super admin seeding.
//!
//! # Usage
//!
//! ```bash
//! storehouse superadmin create
//! ```
//!
//! # Environment Variables
//!
//! - `SUPERADMIN_USERNAME`
//! - `SUPERADMIN_EMAIL`
//! - `SUPERADMIN_PHONE` - `+998` followed by 9 digits
//! - `SUPERADMIN_PASSWORD` - must satisfy the password policy
//!
//! Running it again once a super admin exists is a no-op.

use storehouse_api::db::{AccountRepository, NewAccount};
use storehouse_api::services::auth::hash_password;
use storehouse_core::{AccountId, Email, FieldError, Password, Phone, Role, Username};

use super::{CommandError, connect, required_env};

/// The super admin's details, validated.
#[derive(Debug)]
pub struct SuperAdmin {
    pub username: Username,
    pub email: Email,
    pub phone: Phone,
    pub password: Password,
}

impl SuperAdmin {
    /// Validate raw values.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidField` naming the first bad value.
    pub fn parse(
        username: &str,
        email: &str,
        phone: &str,
        password: &str,
    ) -> Result<Self, CommandError> {
        Ok(Self {
            username: Username::parse(username)?,
            email: Email::parse(email)
                .map_err(|e| FieldError::new("email", e.to_string()))?,
            phone: Phone::parse(phone)?,
            password: Password::parse("password", password)?,
        })
    }

    fn from_env() -> Result<Self, CommandError> {
        Self::parse(
            &required_env("SUPERADMIN_USERNAME")?,
            &required_env("SUPERADMIN_EMAIL")?,
            &required_env("SUPERADMIN_PHONE")?,
            &required_env("SUPERADMIN_PASSWORD")?,
        )
    }
}

/// Create the super admin unless one exists.
///
/// # Returns
///
/// The new account's id, or `None` if a super admin was already present.
///
/// # Errors
///
/// Returns `CommandError` for missing or invalid variables, or if the
/// username, email or phone is taken by another account.
pub async fn create() -> Result<Option<AccountId>, CommandError> {
    dotenvy::dotenv().ok();
    let admin = SuperAdmin::from_env()?;

    let pool = connect().await?;
    let accounts = AccountRepository::new(&pool);

    if accounts.superadmin_exists().await? {
        tracing::info!("Super admin already exists, nothing to do");
        return Ok(None);
    }

    let password_hash = hash_password(admin.password.expose())?;
    let account = accounts
        .create(&NewAccount {
            username: &admin.username,
            full_name: None,
            email: &admin.email,
            phone: &admin.phone,
            address: None,
            role: Role::SuperAdmin,
            password_hash: &password_hash,
        })
        .await?;

    tracing::info!(
        "Super admin created successfully! ID: {}, Username: {}",
        account.id,
        account.username.as_str()
    );
    Ok(Some(account.id))
}
