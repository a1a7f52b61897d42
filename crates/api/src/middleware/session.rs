//! Session cookie.
//!
//! Sign-in sets `Authorization=Bearer <token>` so browser clients can skip
//! the header. `Secure` and `HttpOnly` are only set in production.

use axum::http::{HeaderValue, header::InvalidHeaderValue};
use cookie::{Cookie, SameSite, time::Duration};

use crate::config::AppEnv;
use crate::services::IssuedSession;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "Authorization";

/// `Set-Cookie` value carrying a freshly issued session.
///
/// # Errors
///
/// Returns an error if the cookie is not a valid header value.
pub fn session_cookie(
    session: &IssuedSession,
    env: AppEnv,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = (session.expires_at - chrono::Utc::now()).num_seconds().max(0);
    let secure = env.is_production();

    let cookie = Cookie::build((SESSION_COOKIE_NAME, format!("Bearer {}", session.token)))
        .path("/")
        .max_age(Duration::seconds(max_age))
        .same_site(SameSite::Lax)
        .secure(secure)
        .http_only(secure)
        .build();

    HeaderValue::from_str(&cookie.encoded().to_string())
}

/// `Set-Cookie` value that clears the session cookie.
#[must_use]
pub fn cleared_session_cookie() -> HeaderValue {
    let mut cookie = Cookie::build((SESSION_COOKIE_NAME, "")).path("/").build();
    cookie.make_removal();
    HeaderValue::from_str(&cookie.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("Authorization=; Path=/; Max-Age=0"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn session() -> IssuedSession {
        IssuedSession {
            token: "abc.def.ghi".to_string(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(4),
        }
    }

    #[test]
    fn test_development_cookie_is_not_secure() {
        let value = session_cookie(&session(), AppEnv::Development).unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("Authorization=Bearer%20abc.def.ghi"));
        assert!(!value.contains("Secure"));
        assert!(!value.contains("HttpOnly"));
    }

    #[test]
    fn test_production_cookie_is_secure() {
        let value = session_cookie(&session(), AppEnv::Production).unwrap();
        let value = value.to_str().unwrap();
        assert!(value.contains("Secure"));
        assert!(value.contains("HttpOnly"));
    }

    #[test]
    fn test_cleared_cookie_expires() {
        let value = cleared_session_cookie();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("Authorization=;"));
        assert!(value.contains("Max-Age=0"));
    }
}
