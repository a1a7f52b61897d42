//! Registration, two-step sign-in and verification against PostgreSQL.
//!
//! Needs `DATABASE_URL`; see the crate docs for how to run these.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use storehouse_api::db::AccountRepository;
use storehouse_api::models::{Account, CurrentAccount};
use storehouse_api::services::{AuthError, Registration};
use storehouse_api::state::AppState;
use storehouse_core::{AccountKind, Email, Password, Phone, Role, Username};
use storehouse_integration_tests::{RecordingMailer, database, seed_account, state_with_pool};

const PASSWORD: &str = "Secret#123";

struct Flow {
    state: AppState,
    mailer: Arc<RecordingMailer>,
}

fn flow(pool: PgPool) -> Flow {
    let mailer = Arc::new(RecordingMailer::default());
    Flow {
        state: state_with_pool(pool, mailer.clone()),
        mailer,
    }
}

async fn register(state: &AppState, username: &str, role: Role) -> Account {
    let username = Username::parse(username).unwrap();
    let email = Email::parse(&format!("{username}@example.com")).unwrap();
    let phone = Phone::parse("+998901234567").unwrap();
    let password = Password::parse("password", PASSWORD).unwrap();

    state
        .auth()
        .register(&Registration {
            username: &username,
            full_name: Some("Registered Account"),
            email: &email,
            phone: &phone,
            address: Some("Samarkand"),
            role,
            password: &password,
        })
        .await
        .unwrap()
}

fn caller(account: &Account) -> CurrentAccount {
    CurrentAccount {
        id: account.id,
        email: account.email.clone(),
        role: account.role,
        verified: account.verified,
    }
}

#[sqlx::test(migrator = "storehouse_integration_tests::MIGRATOR")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_accounts_read_back_with_their_role(
    _pool_opts: PgPoolOptions,
    connect_opts: PgConnectOptions,
) {
    let pool = database(connect_opts).await;
    let f = flow(pool.clone());

    let client = register(&f.state, "buyer01", Role::Client).await;
    assert_eq!(client.role, Role::Client);
    assert!(!client.verified);

    let accounts = AccountRepository::new(&pool);
    let stored = accounts
        .get_by_id(AccountKind::Client, client.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.role, Role::Client);
    assert!(accounts.get_by_id(AccountKind::Admin, client.id).await.unwrap().is_none());

    assert!(!accounts.superadmin_exists().await.unwrap());
    let root = seed_account(&pool, Role::SuperAdmin).await;
    assert_eq!(root.role, Role::SuperAdmin);
    assert!(accounts.superadmin_exists().await.unwrap());

    let admins = accounts.list(AccountKind::Admin).await.unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].id, root.id);
}

#[sqlx::test(migrator = "storehouse_integration_tests::MIGRATOR")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_sign_in_errors_do_not_reveal_which_part_failed(
    _pool_opts: PgPoolOptions,
    connect_opts: PgConnectOptions,
) {
    let f = flow(database(connect_opts).await);
    let salesman = register(&f.state, "seller01", Role::Salesman).await;
    let auth = f.state.auth();

    let wrong_password = auth
        .begin_sign_in(AccountKind::Salesman, &salesman.username, "Secret#124")
        .await
        .unwrap_err();
    let unknown_user = auth
        .begin_sign_in(
            AccountKind::Salesman,
            &Username::parse("nobody01").unwrap(),
            PASSWORD,
        )
        .await
        .unwrap_err();
    let other_kind = auth
        .begin_sign_in(AccountKind::Client, &salesman.username, PASSWORD)
        .await
        .unwrap_err();

    for err in [&wrong_password, &unknown_user, &other_kind] {
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.to_string(), "Username or password incorrect");
    }
    assert!(f.mailer.sent().is_empty());
}

#[sqlx::test(migrator = "storehouse_integration_tests::MIGRATOR")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_two_step_sign_in_issues_role_scoped_session(
    _pool_opts: PgPoolOptions,
    connect_opts: PgConnectOptions,
) {
    let f = flow(database(connect_opts).await);
    let admin = register(&f.state, "manager01", Role::Admin).await;
    let auth = f.state.auth();

    auth.begin_sign_in(AccountKind::Admin, &admin.username, PASSWORD)
        .await
        .unwrap();
    let code = f.mailer.last_code();
    assert_eq!(f.mailer.sent()[0].to, admin.email);

    let wrong = (code + 1) % 999_999;
    assert!(matches!(
        auth.complete_sign_in(AccountKind::Admin, &admin.username, wrong)
            .await
            .unwrap_err(),
        AuthError::CodeRejected
    ));

    let session = auth
        .complete_sign_in(AccountKind::Admin, &admin.username, code)
        .await
        .unwrap();
    let minutes = (session.expires_at - Utc::now()).num_minutes();
    assert!((119..=120).contains(&minutes), "{minutes}");

    let current = f.state.tokens().verify(&session.token).unwrap();
    assert_eq!(current.id, admin.id);
    assert_eq!(current.role, Role::Admin);

    // The code was consumed.
    assert!(
        auth.complete_sign_in(AccountKind::Admin, &admin.username, code)
            .await
            .is_err()
    );
}

#[sqlx::test(migrator = "storehouse_integration_tests::MIGRATOR")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_verification_flips_flag_once(
    _pool_opts: PgPoolOptions,
    connect_opts: PgConnectOptions,
) {
    let pool = database(connect_opts).await;
    let f = flow(pool.clone());
    let client = register(&f.state, "buyer02", Role::Client).await;
    let auth = f.state.auth();

    auth.request_verification(&caller(&client)).await.unwrap();
    let code = f.mailer.last_code();
    auth.confirm_verification(&caller(&client), code)
        .await
        .unwrap();

    let stored = AccountRepository::new(&pool)
        .get_by_id(AccountKind::Client, client.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.verified);

    let err = auth.request_verification(&caller(&client)).await.unwrap_err();
    assert!(matches!(err, AuthError::AlreadyVerified));
    assert_eq!(f.mailer.sent().len(), 1);
}

#[sqlx::test(migrator = "storehouse_integration_tests::MIGRATOR")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_verified_account_is_told_so_and_keeps_pending_code(
    _pool_opts: PgPoolOptions,
    connect_opts: PgConnectOptions,
) {
    let pool = database(connect_opts).await;
    let f = flow(pool.clone());
    let client = register(&f.state, "buyer03", Role::Client).await;
    AccountRepository::new(&pool)
        .mark_verified(client.id)
        .await
        .unwrap();
    let auth = f.state.auth();

    auth.begin_sign_in(AccountKind::Client, &client.username, PASSWORD)
        .await
        .unwrap();
    let code = f.mailer.last_code();

    // The token still says unverified; the stored account decides.
    let err = auth
        .confirm_verification(&caller(&client), code)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AlreadyVerified));
    assert_eq!(err.to_string(), "You are already verified");

    auth.complete_sign_in(AccountKind::Client, &client.username, code)
        .await
        .unwrap();
}

#[sqlx::test(migrator = "storehouse_integration_tests::MIGRATOR")]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_password_reset_replaces_credentials(
    _pool_opts: PgPoolOptions,
    connect_opts: PgConnectOptions,
) {
    let f = flow(database(connect_opts).await);
    let client = register(&f.state, "buyer04", Role::Client).await;
    let auth = f.state.auth();
    let new_password = Password::parse("newPassword", "Fresh#4567").unwrap();

    auth.send_reset_code(AccountKind::Client, &client.email)
        .await
        .unwrap();
    let code = f.mailer.last_code();
    auth.reset_password(AccountKind::Client, &client.email, code, &new_password)
        .await
        .unwrap();

    assert!(matches!(
        auth.begin_sign_in(AccountKind::Client, &client.username, PASSWORD)
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    ));
    auth.begin_sign_in(AccountKind::Client, &client.username, "Fresh#4567")
        .await
        .unwrap();
}
