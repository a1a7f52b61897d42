//! Request bodies for the account routes.

use serde::Deserialize;

use storehouse_core::{AccountKind, Email, FieldError, Password, Phone, Role, Username};

use crate::db::AccountChanges;
use crate::routes::fields::{self, ProvidedCode};

/// A validated new account.
#[derive(Debug)]
pub struct ValidAccount {
    pub username: Username,
    pub full_name: Option<String>,
    pub email: Email,
    pub phone: Phone,
    pub address: Option<String>,
    pub role: Role,
    pub password: Password,
}

/// Body of a create or sign-up request.
pub trait AccountForm {
    fn validate(self, kind: AccountKind) -> Result<ValidAccount, FieldError>;
}

/// Body of an update request.
pub trait AccountUpdateForm {
    fn validate(self) -> Result<AccountChanges, FieldError>;
}

fn full_name(raw: &str) -> Result<String, FieldError> {
    fields::text("fullName", raw, 3, usize::MAX)
}

fn address(raw: &str) -> Result<String, FieldError> {
    fields::text("address", raw, 4, 100)
}

// =============================================================================
// Admins
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAdminRequest {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: Option<String>,
    pub password: String,
}

impl AccountForm for CreateAdminRequest {
    fn validate(self, kind: AccountKind) -> Result<ValidAccount, FieldError> {
        let role = match self.role.as_deref() {
            None => kind.default_role(),
            Some(raw) => raw
                .parse::<Role>()
                .ok()
                .filter(|role| kind.includes(*role))
                .ok_or_else(|| FieldError::new("role", "must be one of [superadmin, admin]"))?,
        };

        Ok(ValidAccount {
            username: Username::parse(&self.username)?,
            full_name: None,
            email: fields::email(&self.email)?,
            phone: Phone::parse(&self.phone)?,
            address: None,
            role,
            password: Password::parse("password", &self.password)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAdminRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl AccountUpdateForm for UpdateAdminRequest {
    fn validate(self) -> Result<AccountChanges, FieldError> {
        Ok(AccountChanges {
            username: fields::optional(self.username.as_deref(), Username::parse)?,
            email: fields::optional(self.email.as_deref(), fields::email)?,
            phone: fields::optional(self.phone.as_deref(), Phone::parse)?,
            ..AccountChanges::default()
        })
    }
}

// =============================================================================
// Salesmen and clients
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProfileRequest {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub password: String,
}

impl AccountForm for CreateProfileRequest {
    fn validate(self, kind: AccountKind) -> Result<ValidAccount, FieldError> {
        Ok(ValidAccount {
            username: Username::parse(&self.username)?,
            full_name: Some(full_name(&self.full_name)?),
            email: fields::email(&self.email)?,
            phone: Phone::parse(&self.phone)?,
            address: Some(address(&self.address)?),
            role: kind.default_role(),
            password: Password::parse("password", &self.password)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl AccountUpdateForm for UpdateProfileRequest {
    fn validate(self) -> Result<AccountChanges, FieldError> {
        Ok(AccountChanges {
            username: fields::optional(self.username.as_deref(), Username::parse)?,
            full_name: fields::optional(self.full_name.as_deref(), full_name)?,
            email: fields::optional(self.email.as_deref(), fields::email)?,
            phone: fields::optional(self.phone.as_deref(), Phone::parse)?,
            address: fields::optional(self.address.as_deref(), address)?,
            password_hash: None,
        })
    }
}

// =============================================================================
// Sign-in and passwords
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmSignInRequest {
    pub username: String,
    pub provided_code: ProvidedCode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRequest {
    pub provided_code: ProvidedCode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub provided_code: ProvidedCode,
    pub new_password: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn admin(role: Option<&str>) -> CreateAdminRequest {
        CreateAdminRequest {
            username: "Boss01".to_string(),
            email: "boss@example.com".to_string(),
            phone: "+998901234567".to_string(),
            role: role.map(str::to_owned),
            password: "Secret#123".to_string(),
        }
    }

    #[test]
    fn test_admin_role_defaults_to_admin() {
        let account = admin(None).validate(AccountKind::Admin).unwrap();
        assert_eq!(account.role, Role::Admin);
        assert_eq!(account.username.as_str(), "boss01");
    }

    #[test]
    fn test_admin_may_request_superadmin() {
        let account = admin(Some("superadmin")).validate(AccountKind::Admin).unwrap();
        assert_eq!(account.role, Role::SuperAdmin);
    }

    #[test]
    fn test_admin_role_outside_kind_is_rejected() {
        let err = admin(Some("client")).validate(AccountKind::Admin).unwrap_err();
        assert_eq!(err.field, "role");
    }

    #[test]
    fn test_profile_requires_policy_password() {
        let request = CreateProfileRequest {
            username: "seller1".to_string(),
            full_name: "Sam Seller".to_string(),
            email: "seller@example.com".to_string(),
            phone: "+998901234567".to_string(),
            address: "Tashkent".to_string(),
            password: "weakpass".to_string(),
        };
        let err = request.validate(AccountKind::Salesman).unwrap_err();
        assert_eq!(err.field, "password");
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let body = r#"{"username":"x","email":"y","phone":"z","password":"p","fullName":"n"}"#;
        assert!(serde_json::from_str::<CreateAdminRequest>(body).is_err());
    }

    #[test]
    fn test_partial_update() {
        let changes = UpdateProfileRequest {
            username: None,
            full_name: Some("New Name".to_string()),
            email: None,
            phone: Some("+998991112233".to_string()),
            address: None,
        }
        .validate()
        .unwrap();

        assert!(changes.username.is_none());
        assert_eq!(changes.full_name.as_deref(), Some("New Name"));
        assert_eq!(changes.phone.unwrap().as_str(), "+998991112233");
    }
}
