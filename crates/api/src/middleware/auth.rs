//! Authentication extractors.
//!
//! The session token is read from the `Authorization: Bearer <token>` header
//! and, failing that, from the `Authorization` cookie set at sign-in.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use cookie::Cookie;

use storehouse_core::{Access, AccountId};

use super::session::SESSION_COOKIE_NAME;
use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentAccount;
use crate::state::AppState;

/// Extractor that requires a valid session.
///
/// Rejects with 401 "Unauthorized user" when no token is present or the
/// token does not verify, and 401 "Invalid token" when the credential is not
/// a bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(caller): RequireAuth) -> impl IntoResponse {
///     format!("Hello, account {}!", caller.id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub CurrentAccount);

impl RequireAuth {
    /// Apply a route's access requirement to this caller.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` if access is denied.
    pub fn authorize(&self, access: Access, target: Option<AccountId>) -> Result<(), AppError> {
        access.authorize(self.0.id, self.0.role, target)?;
        Ok(())
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credential = credential(&parts.headers).ok_or_else(AppError::unauthorized)?;
        let token = bearer_token(&credential)
            .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

        let caller = state.tokens().verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::unauthorized()
        })?;

        set_sentry_user(caller.id.as_i32(), Some(caller.email.as_str()));
        Ok(Self(caller))
    }
}

/// The raw credential: header first, then cookie.
fn credential(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        return value.to_str().ok().map(str::to_owned);
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE_NAME)
        .map(|c| c.value().to_owned())
}

/// Extract the token from `Bearer <token>`.
fn bearer_token(credential: &str) -> Option<&str> {
    let (scheme, token) = credential.split_once(' ')?;
    let token = token.trim();
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }

    #[test]
    fn test_header_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("Authorization=Bearer%20cookie"),
        );
        assert_eq!(credential(&headers).unwrap(), "Bearer header");
    }

    #[test]
    fn test_cookie_fallback_is_decoded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; Authorization=Bearer%20from-cookie"),
        );
        assert_eq!(credential(&headers).unwrap(), "Bearer from-cookie");
    }

    #[test]
    fn test_missing_credential() {
        assert!(credential(&HeaderMap::new()).is_none());
    }
}
