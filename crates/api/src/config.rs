//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREHOUSE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `TOKEN_SECRET` - Session token signing secret (min 32 chars, high entropy)
//! - `HMAC_SECRET` - Key for one-time code digests (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREHOUSE_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREHOUSE_PORT` - Listen port (default: 3000)
//! - `APP_ENV` - `production` marks session cookies `Secure` and `HttpOnly`
//!   (default: development)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (SMTP - without it codes are written to the log)
//! - `SMTP_HOST` - SMTP server hostname
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_USERNAME` - SMTP authentication username
//! - `SMTP_PASSWORD` - SMTP authentication password
//! - `SMTP_FROM` - Email sender address

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const MIN_SIGNING_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Runtime mode, read from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn from_env() -> Self {
        match optional_env("APP_ENV").as_deref() {
            Some("production") => Self::Production,
            _ => Self::Development,
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Runtime mode
    pub app_env: AppEnv,
    /// Signing secrets for session tokens and code digests
    pub secrets: SecretsConfig,
    /// SMTP configuration (optional - codes are logged when absent)
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Signing secrets.
///
/// Implements `Debug` manually to redact both keys.
#[derive(Clone)]
pub struct SecretsConfig {
    /// HS256 key for session tokens
    pub token_secret: SecretString,
    /// HMAC-SHA256 key for pending one-time codes
    pub hmac_secret: SecretString,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("token_secret", &"[REDACTED]")
            .field("hmac_secret", &"[REDACTED]")
            .finish()
    }
}

impl SecretsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            token_secret: signing_secret("TOKEN_SECRET")?,
            hmac_secret: signing_secret("HMAC_SECRET")?,
        })
    }
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl EmailConfig {
    /// Load SMTP configuration.
    ///
    /// Returns `None` when `SMTP_HOST` is unset. Once the host is given, the
    /// remaining variables are required.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parsed_env("SMTP_PORT", 587)?,
            smtp_username: required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(required_env("SMTP_PASSWORD")?),
            from_address: required_env("SMTP_FROM")?,
        }))
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = database_url()?;
        let host = parsed_env("STOREHOUSE_HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?;
        let port = parsed_env("STOREHOUSE_PORT", 3000)?;
        let app_env = AppEnv::from_env();
        let secrets = SecretsConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let sentry_dsn = optional_env("SENTRY_DSN");
        let sentry_environment = optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = parsed_env("SENTRY_SAMPLE_RATE", 1.0)?;
        let sentry_traces_sample_rate = parsed_env("SENTRY_TRACES_SAMPLE_RATE", 1.0)?;

        if email.is_none() && app_env.is_production() {
            return Err(ConfigError::MissingEnvVar("SMTP_HOST".to_string()));
        }

        Ok(Self {
            database_url,
            host,
            port,
            app_env,
            secrets,
            email,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns a reference to the SMTP configuration, if available.
    #[must_use]
    pub const fn email(&self) -> Option<&EmailConfig> {
        self.email.as_ref()
    }
}

// =============================================================================
// Environment access
// =============================================================================

fn required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `key`, using `default` when it is unset.
fn parsed_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// `STOREHOUSE_DATABASE_URL`, else `DATABASE_URL`.
fn database_url() -> Result<SecretString, ConfigError> {
    optional_env("STOREHOUSE_DATABASE_URL")
        .or_else(|| optional_env("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar("STOREHOUSE_DATABASE_URL".to_string()))
}

// =============================================================================
// Secret strength
// =============================================================================

/// Load a signing key and reject short, placeholder or low-entropy values.
fn signing_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = required_env(key)?;
    check_signing_secret(&value, key)?;
    Ok(SecretString::from(value))
}

fn check_signing_secret(value: &str, key: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| Err(ConfigError::InsecureSecret(key.to_string(), reason));

    if value.len() < MIN_SIGNING_SECRET_LENGTH {
        return insecure(format!(
            "must be at least {MIN_SIGNING_SECRET_LENGTH} characters (got {})",
            value.len()
        ));
    }

    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return insecure(format!("appears to be a placeholder (contains '{pattern}')"));
    }

    let entropy = shannon_entropy(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return insecure(format!(
            "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
        ));
    }

    Ok(())
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let len = s.chars().count() as f64;
    #[allow(clippy::cast_precision_loss)]
    freq.values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}
