//! One-time code issuer.
//!
//! Codes are drawn from `0..999_999`, mailed to the account's address and
//! remembered only as an HMAC-SHA256 digest keyed by the address. A code is
//! stored only after the mail transport accepted the exact recipient, lives
//! for [`CODE_TTL`], and is consumed by the first successful confirmation.
//! Issuing a new code for the same address replaces the previous one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use moka::future::Cache;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use storehouse_core::Email;

use super::email::{CodePurpose, MailError, Mailer, OutgoingMail};

type HmacSha256 = Hmac<Sha256>;

const CODE_TTL_SECONDS: u16 = 120;

/// How long an issued code stays valid.
pub const CODE_TTL: Duration = Duration::from_secs(CODE_TTL_SECONDS as u64);

/// Upper bound (exclusive) of generated codes.
const CODE_RANGE_END: u32 = 999_999;

/// Capacity of the in-process code store.
const CODE_STORE_CAPACITY: u64 = 100_000;

/// Errors from issuing codes.
#[derive(Debug, Error)]
pub enum CodeError {
    /// The transport did not accept the target address.
    #[error("code was not delivered")]
    NotDelivered,

    /// Mail could not be built or sent.
    #[error(transparent)]
    Mail(#[from] MailError),

    /// The HMAC key was rejected.
    #[error("invalid HMAC key")]
    InvalidKey,
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A stored code digest and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCode {
    pub digest: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

/// Storage for pending codes, one entry per email address.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Store a code, replacing any previous code for the address.
    async fn put(&self, email: &Email, code: PendingCode);

    async fn get(&self, email: &Email) -> Option<PendingCode>;

    async fn remove(&self, email: &Email);
}

/// In-process code store backed by a moka cache.
#[derive(Clone)]
pub struct MokaCodeStore {
    cache: Cache<String, PendingCode>,
}

impl MokaCodeStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(CODE_STORE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl Default for MokaCodeStore {
    fn default() -> Self {
        Self::new(CODE_TTL)
    }
}

#[async_trait]
impl CodeStore for MokaCodeStore {
    async fn put(&self, email: &Email, code: PendingCode) {
        self.cache.insert(email.as_str().to_owned(), code).await;
    }

    async fn get(&self, email: &Email) -> Option<PendingCode> {
        self.cache.get(email.as_str()).await
    }

    async fn remove(&self, email: &Email) {
        self.cache.invalidate(email.as_str()).await;
    }
}

/// Draw a code uniformly from `0..999_999`. No zero padding.
#[must_use]
pub fn generate_code() -> String {
    rand::rng().random_range(0..CODE_RANGE_END).to_string()
}

/// Issues and confirms one-time codes.
#[derive(Clone)]
pub struct CodeIssuer {
    store: Arc<dyn CodeStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    mac: HmacSha256,
}

impl CodeIssuer {
    /// Create an issuer.
    ///
    /// # Errors
    ///
    /// Returns `CodeError::InvalidKey` if the HMAC key is rejected.
    pub fn new(
        store: Arc<dyn CodeStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        hmac_secret: &SecretString,
    ) -> Result<Self, CodeError> {
        let mac = HmacSha256::new_from_slice(hmac_secret.expose_secret().as_bytes())
            .map_err(|_| CodeError::InvalidKey)?;

        Ok(Self {
            store,
            mailer,
            clock,
            mac,
        })
    }

    fn digest(&self, code: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(code.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Generate a code, mail it and remember it.
    ///
    /// # Errors
    ///
    /// Returns `CodeError::NotDelivered` if the transport did not accept the
    /// address, or `CodeError::Mail` if sending failed. Nothing is stored in
    /// either case.
    #[tracing::instrument(skip(self), fields(email = %email))]
    pub async fn issue(&self, email: &Email, purpose: CodePurpose) -> Result<(), CodeError> {
        let code = generate_code();
        let mail = OutgoingMail::code(email, &code, purpose, CODE_TTL)?;

        let delivery = self.mailer.send(&mail).await?;
        if !delivery.accepted(email) {
            tracing::warn!(accepted = ?delivery.accepted, "Code rejected by mail transport");
            return Err(CodeError::NotDelivered);
        }

        let pending = PendingCode {
            digest: self.digest(&code),
            expires_at: self.clock.now() + chrono::Duration::seconds(i64::from(CODE_TTL_SECONDS)),
        };
        self.store.put(email, pending).await;

        tracing::debug!("Code issued");
        Ok(())
    }

    /// Check a provided code. A match consumes the stored code.
    ///
    /// Returns `false` when no code is pending, it has expired, or it differs.
    #[tracing::instrument(skip(self, provided), fields(email = %email))]
    pub async fn confirm(&self, email: &Email, provided: u64) -> bool {
        let Some(pending) = self.store.get(email).await else {
            return false;
        };

        if self.clock.now() >= pending.expires_at {
            self.store.remove(email).await;
            return false;
        }

        let mut mac = self.mac.clone();
        mac.update(provided.to_string().as_bytes());
        if mac.verify_slice(&pending.digest).is_err() {
            return false;
        }

        self.store.remove(email).await;
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::services::email::Delivery;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, seconds: i64) {
            let mut now = self.0.lock().unwrap();
            *now += chrono::Duration::seconds(seconds);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingMail>>,
        reject: bool,
    }

    impl RecordingMailer {
        fn last_code(&self) -> u64 {
            let sent = self.sent.lock().unwrap();
            let mail = sent.last().unwrap();
            mail.text_body.lines().nth(2).unwrap().trim().parse().unwrap()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: &OutgoingMail) -> Result<Delivery, MailError> {
            self.sent.lock().unwrap().push(mail.clone());
            if self.reject {
                return Ok(Delivery::default());
            }
            Ok(Delivery {
                accepted: vec![mail.to.to_string()],
            })
        }
    }

    fn secret() -> SecretString {
        SecretString::from("k3y-for-code-digests-in-unit-tests-only")
    }

    fn setup(reject: bool) -> (CodeIssuer, Arc<RecordingMailer>, Arc<ManualClock>) {
        let mailer = Arc::new(RecordingMailer {
            reject,
            ..RecordingMailer::default()
        });
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));
        let issuer = CodeIssuer::new(
            Arc::new(MokaCodeStore::default()),
            mailer.clone(),
            clock.clone(),
            &secret(),
        )
        .unwrap();
        (issuer, mailer, clock)
    }

    fn email() -> Email {
        Email::parse("client@example.com").unwrap()
    }

    #[test]
    fn test_generate_code_in_range() {
        for _ in 0..1000 {
            let code: u32 = generate_code().parse().unwrap();
            assert!(code < CODE_RANGE_END);
        }
    }

    #[tokio::test]
    async fn test_confirm_consumes_code() {
        let (issuer, mailer, _) = setup(false);
        issuer.issue(&email(), CodePurpose::SignIn).await.unwrap();
        let code = mailer.last_code();

        assert!(issuer.confirm(&email(), code).await);
        assert!(!issuer.confirm(&email(), code).await);
    }

    #[tokio::test]
    async fn test_wrong_code_is_rejected_and_kept() {
        let (issuer, mailer, _) = setup(false);
        issuer.issue(&email(), CodePurpose::Verification).await.unwrap();
        let code = mailer.last_code();

        assert!(!issuer.confirm(&email(), code + 1).await);
        assert!(issuer.confirm(&email(), code).await);
    }

    #[tokio::test]
    async fn test_expiry_follows_clock() {
        let (issuer, mailer, clock) = setup(false);
        issuer.issue(&email(), CodePurpose::SignIn).await.unwrap();
        let code = mailer.last_code();

        clock.advance(119);
        assert!(issuer.confirm(&email(), code).await);

        issuer.issue(&email(), CodePurpose::SignIn).await.unwrap();
        let code = mailer.last_code();
        clock.advance(121);
        assert!(!issuer.confirm(&email(), code).await);
    }

    #[tokio::test]
    async fn test_undelivered_code_is_not_stored() {
        let (issuer, mailer, _) = setup(true);
        let err = issuer.issue(&email(), CodePurpose::SignIn).await.unwrap_err();
        assert!(matches!(err, CodeError::NotDelivered));

        let code = mailer.last_code();
        assert!(!issuer.confirm(&email(), code).await);
    }

    #[tokio::test]
    async fn test_codes_are_scoped_to_address() {
        let (issuer, mailer, _) = setup(false);
        issuer.issue(&email(), CodePurpose::SignIn).await.unwrap();
        let code = mailer.last_code();

        let other = Email::parse("other@example.com").unwrap();
        assert!(!issuer.confirm(&other, code).await);
    }
}
