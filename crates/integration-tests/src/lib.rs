//! Integration tests for Storehouse.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storehouse-integration-tests
//! ```
//!
//! The router tests use a lazily connected pool and only exercise paths that
//! are decided before the database is reached (authentication, access,
//! request validation), so no running `PostgreSQL` is needed.
//!
//! The storage tests need a server. `#[sqlx::test]` creates and migrates a
//! fresh database per test from `DATABASE_URL`; they are ignored by default:
//!
//! ```bash
//! DATABASE_URL=postgres://postgres@localhost:5432/postgres \
//!     cargo test -p storehouse-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `access_policy` - 401/403/400/422 decisions through the full router
//! - `one_time_codes` - Code issuing, expiry and delivery rules
//! - `inventory_ledger` - Stock arithmetic across sale scenarios
//! - `ledger_storage` - Sales, revisions and cascades against `PostgreSQL`
//! - `sign_in_flow` - Registration, two-step sign-in and verification against `PostgreSQL`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgConnectOptions;

use storehouse_api::config::{ApiConfig, AppEnv, SecretsConfig};
use storehouse_api::db::{AccountRepository, CategoryRepository, NewAccount, NewProduct, ProductRepository};
use storehouse_api::models::{Account, Category, Product};
use storehouse_api::services::Clock;
use storehouse_api::services::email::{Delivery, MailError, Mailer, OutgoingMail};
use storehouse_api::state::AppState;
use storehouse_core::{AccountId, CategoryId, Email, Phone, Price, Role, Username};

/// Migrations applied by `#[sqlx::test]` to every fresh test database.
pub static MIGRATOR: Migrator = sqlx::migrate!("../api/migrations");

/// A clock that only moves when told to.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    #[must_use]
    pub fn starting_now() -> Self {
        Self(Mutex::new(Utc::now()))
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.0.lock().unwrap();
        *now += chrono::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// A mailer that keeps every message and optionally refuses delivery.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    reject: bool,
}

impl RecordingMailer {
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    /// The code in the most recent message.
    #[must_use]
    pub fn last_code(&self) -> u64 {
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

/// Configuration with fixed secrets and no SMTP or Sentry.
#[must_use]
pub fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://storehouse@localhost:5432/storehouse_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        app_env: AppEnv::Development,
        secrets: SecretsConfig {
            token_secret: SecretString::from("tok3n-Secret-for-integration-TESTS-0nly!"),
            hmac_secret: SecretString::from("hm4c-Secret-for-integration-TESTS-0nly!"),
        },
        email: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Application state over a pool that never connects unless queried.
#[must_use]
pub fn test_state(mailer: Arc<RecordingMailer>) -> AppState {
    let pool = storehouse_api::db::pool_options()
        .connect_lazy("postgres://storehouse@localhost:5432/storehouse_test")
        .unwrap();
    state_with_pool(pool, mailer)
}

/// Application state over `pool`, mailing through `mailer`.
#[must_use]
pub fn state_with_pool(pool: PgPool, mailer: Arc<RecordingMailer>) -> AppState {
    AppState::with_mailer(test_config(), pool, mailer, Arc::new(ManualClock::starting_now()))
        .unwrap()
}

// =============================================================================
// Database fixtures
// =============================================================================

/// Pool over a `#[sqlx::test]` database with the server's connection setup.
pub async fn database(connect_opts: PgConnectOptions) -> PgPool {
    storehouse_api::db::pool_options()
        .connect_with(connect_opts)
        .await
        .unwrap()
}

static NEXT_ACCOUNT: AtomicU32 = AtomicU32::new(1);

/// Insert an account of `role` with unique identity fields.
///
/// The password hash is not a valid PHC string; accounts that must sign in
/// are registered through the auth service instead.
pub async fn seed_account(pool: &PgPool, role: Role) -> Account {
    let n = NEXT_ACCOUNT.fetch_add(1, Ordering::Relaxed);
    let username = Username::parse(&format!("{}{n:03}", role.as_str())).unwrap();
    let email = Email::parse(&format!("{username}@example.com")).unwrap();
    let phone = Phone::parse(&format!("+99893{n:07}")).unwrap();

    AccountRepository::new(pool)
        .create(&NewAccount {
            username: &username,
            full_name: Some("Seeded Account"),
            email: &email,
            phone: &phone,
            address: Some("Tashkent"),
            role,
            password_hash: "unusable",
        })
        .await
        .unwrap()
}

/// Insert a category.
pub async fn seed_category(pool: &PgPool, name: &str) -> Category {
    CategoryRepository::new(pool)
        .create(name, "Seeded category for storage tests")
        .await
        .unwrap()
}

/// Insert a product of `quantity` units at `price`.
pub async fn seed_product(
    pool: &PgPool,
    name: &str,
    category_id: CategoryId,
    salesman_id: AccountId,
    price: Decimal,
    quantity: i32,
) -> Product {
    ProductRepository::new(pool)
        .create(&NewProduct {
            name,
            description: "Seeded product for storage tests",
            price: Price::new(price).unwrap(),
            quantity,
            color: "black",
            category_id,
            salesman_id,
        })
        .await
        .unwrap()
}

/// An account with the given id and role.
#[must_use]
pub fn account(id: i32, role: Role) -> Account {
    let now = Utc::now();
    Account {
        id: AccountId::new(id),
        username: Username::parse(&format!("user{id:02}")).unwrap(),
        full_name: None,
        email: Email::parse(&format!("user{id}@example.com")).unwrap(),
        phone: Phone::parse(&format!("+99890{id:07}")).unwrap(),
        address: None,
        role,
        verified: true,
        created_at: now,
        updated_at: now,
    }
}

/// `Authorization` header value for a session of `account`.
#[must_use]
pub fn bearer(state: &AppState, account: &Account) -> String {
    let session = state.tokens().issue(account).unwrap();
    format!("Bearer {}", session.token)
}
