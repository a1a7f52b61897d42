//! Account identity fields: usernames, phone numbers and passwords.
//!
//! Each type validates on construction so that the API layer can reject
//! malformed input with a field-level message before touching the database.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A field-level validation failure.
///
/// The message names the offending field so it can be shown to the caller
/// as-is (rendered as `Validation error: <message>`).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("\"{field}\" {reason}")]
pub struct FieldError {
    /// Name of the field as it appears in request bodies.
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl FieldError {
    /// Create a new field error.
    #[must_use]
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Check that `value` has between `min` and `max` characters.
///
/// # Errors
///
/// Returns a [`FieldError`] naming `field` when the length is out of range.
pub fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), FieldError> {
    let len = value.chars().count();
    if len < min {
        return Err(FieldError::new(
            field,
            format!("length must be at least {min} characters long"),
        ));
    }
    if len > max {
        return Err(FieldError::new(
            field,
            format!("length must be less than or equal to {max} characters long"),
        ));
    }
    Ok(())
}

// =============================================================================
// Username
// =============================================================================

/// A unique login name.
///
/// ## Constraints
///
/// - Trimmed and lowercased
/// - 4-15 characters
/// - At least one ASCII letter or digit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Minimum username length.
    pub const MIN_LENGTH: usize = 4;
    /// Maximum username length.
    pub const MAX_LENGTH: usize = 15;

    /// Parse a `Username` from user input.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] if the length is out of range or the value
    /// contains no alphanumeric character.
    pub fn parse(s: &str) -> Result<Self, FieldError> {
        let s = s.trim().to_lowercase();
        check_length("username", &s, Self::MIN_LENGTH, Self::MAX_LENGTH)?;

        if !s.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(FieldError::new(
                "username",
                "must contain at least one letter or digit",
            ));
        }

        Ok(Self(s))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Phone
// =============================================================================

/// A phone number in the `+998XXXXXXXXX` format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Country prefix every number must start with.
    pub const PREFIX: &'static str = "+998";
    /// Number of digits after the prefix.
    pub const SUBSCRIBER_DIGITS: usize = 9;

    /// Parse a `Phone` from user input.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] unless the input is `+998` followed by exactly
    /// nine digits.
    pub fn parse(s: &str) -> Result<Self, FieldError> {
        let s = s.trim();
        let valid = s.strip_prefix(Self::PREFIX).is_some_and(|rest| {
            rest.len() == Self::SUBSCRIBER_DIGITS && rest.chars().all(|c| c.is_ascii_digit())
        });

        if !valid {
            return Err(FieldError::new(
                "phone",
                "must match the format +998XXXXXXXXX",
            ));
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Phone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Password
// =============================================================================

/// A plaintext password that satisfies the password policy.
///
/// Only exists long enough to be hashed. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Minimum password length.
    pub const MIN_LENGTH: usize = 8;
    /// Special characters, at least one of which is required.
    pub const SPECIAL_CHARACTERS: &'static str = "#?!@$%^&*-";

    /// Validate a new password against the policy.
    ///
    /// `field` is the request field the password came from (`password`,
    /// `newPassword`), used in the error message.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] unless the password has at least eight
    /// characters including an uppercase letter, a lowercase letter, a digit
    /// and one of `#?!@$%^&*-`.
    pub fn parse(field: &'static str, s: &str) -> Result<Self, FieldError> {
        let long_enough = s.chars().count() >= Self::MIN_LENGTH;
        let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
        let has_digit = s.chars().any(|c| c.is_ascii_digit());
        let has_special = s.chars().any(|c| Self::SPECIAL_CHARACTERS.contains(c));

        if !(long_enough && has_upper && has_lower && has_digit && has_special) {
            return Err(FieldError::new(
                field,
                "must be at least 8 characters and contain an uppercase letter, \
                 a lowercase letter, a digit and one of #?!@$%^&*-",
            ));
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the plaintext for hashing.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
macro_rules! impl_text_column {
    ($name:ident) => {
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                // Database values are assumed valid
                Ok(Self(s))
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

#[cfg(feature = "postgres")]
impl_text_column!(Username);
#[cfg(feature = "postgres")]
impl_text_column!(Phone);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_username_normalized() {
        let username = Username::parse("  JohnDoe ").unwrap();
        assert_eq!(username.as_str(), "johndoe");
    }

    #[test]
    fn test_username_length_bounds() {
        assert!(Username::parse("abc").is_err());
        assert!(Username::parse("abcd").is_ok());
        assert!(Username::parse("a".repeat(15).as_str()).is_ok());
        assert!(Username::parse("a".repeat(16).as_str()).is_err());
    }

    #[test]
    fn test_username_requires_alphanumeric() {
        let err = Username::parse("____").unwrap_err();
        assert_eq!(err.field, "username");
    }

    #[test]
    fn test_phone_valid() {
        let phone = Phone::parse("+998901234567").unwrap();
        assert_eq!(phone.as_str(), "+998901234567");
    }

    #[test]
    fn test_phone_invalid() {
        assert!(Phone::parse("998901234567").is_err());
        assert!(Phone::parse("+99890123456").is_err());
        assert!(Phone::parse("+9989012345678").is_err());
        assert!(Phone::parse("+99890123456a").is_err());
        assert!(Phone::parse("+7901234567").is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(Password::parse("password", "Secret#123").is_ok());
        assert!(Password::parse("password", "secret#123").is_err());
        assert!(Password::parse("password", "SECRET#123").is_err());
        assert!(Password::parse("password", "Secret#abc").is_err());
        assert!(Password::parse("password", "Secret1234").is_err());
        assert!(Password::parse("password", "Se#1").is_err());
    }

    #[test]
    fn test_password_error_names_field() {
        let err = Password::parse("newPassword", "weak").unwrap_err();
        assert_eq!(err.field, "newPassword");
        assert!(err.to_string().starts_with("\"newPassword\""));
    }

    #[test]
    fn test_password_debug_redacts() {
        let password = Password::parse("password", "Secret#123").unwrap();
        let debug = format!("{password:?}");
        assert!(!debug.contains("Secret#123"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_check_length_messages() {
        let err = check_length("name", "abc", 5, 15).unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"name\" length must be at least 5 characters long"
        );
        assert!(check_length("name", "abcdef", 5, 15).is_ok());
    }
}
