//! Request field validation shared by the route modules.

use serde::Deserialize;

use storehouse_core::{Email, FieldError, check_length};

/// Longest accepted email address in request bodies.
const EMAIL_MAX_LENGTH: usize = 50;

/// Validate an email field: 5-50 characters and a well-formed address.
pub fn email(raw: &str) -> Result<Email, FieldError> {
    check_length("email", raw.trim(), 5, EMAIL_MAX_LENGTH)?;
    Email::parse(raw).map_err(|_| FieldError::new("email", "must be a valid email"))
}

/// Validate a free-text field by length and take ownership of it.
pub fn text(field: &'static str, raw: &str, min: usize, max: usize) -> Result<String, FieldError> {
    check_length(field, raw, min, max)?;
    Ok(raw.to_owned())
}

/// Apply `parse` to an optional field.
pub fn optional<T, U>(
    value: Option<T>,
    parse: impl FnOnce(T) -> Result<U, FieldError>,
) -> Result<Option<U>, FieldError> {
    value.map(parse).transpose()
}

/// A one-time code as sent by clients: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProvidedCode {
    Number(u64),
    Text(String),
}

impl ProvidedCode {
    pub fn value(&self) -> Result<u64, FieldError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| FieldError::new("providedCode", "must be a number")),
        }
    }
}
