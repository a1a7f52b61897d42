//! Account routes, shared by admins, salesmen and clients.
//!
//! Each account kind is an [`Audience`]: it fixes the kind, the access table
//! and the request/response shapes, and gets the same set of handlers.
//!
//! ```text
//! POST   /signin                      - Check password, mail a code
//! POST   /confirm-signin              - Exchange the code for a session
//! POST   /signout                     - Clear the session cookie
//! POST   /send-verification           - Mail a verification code
//! PATCH  /check-verification          - Verify the account
//! PATCH  /change-password             - Change password
//! POST   /send-forgot-password-code   - Mail a reset code
//! PATCH  /check-forgot-password-code  - Reset password
//! POST   /create | /signup            - Staff-created or self-service accounts
//! GET    /get-all
//! GET    /get-by-id?id=
//! PATCH  /update?id=
//! DELETE /delete?id=
//! ```

mod auth;
mod forms;
mod manage;

use async_trait::async_trait;
use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::PgPool;

use storehouse_core::{Access, AccountKind, access::routes};

use crate::db::{AccountRepository, RepositoryError};
use crate::models::{Account, ClientDetails, SalesmanDetails};
use crate::state::AppState;

pub use forms::{AccountForm, AccountUpdateForm};

/// How accounts of a kind come into existence.
#[derive(Debug, Clone, Copy)]
pub enum Enrollment {
    /// Created through `/create` by callers holding this access.
    Staff(Access),
    /// Created by the account holder through `/signup`.
    SelfService,
}

/// An account kind served under its own path prefix.
#[async_trait]
pub trait Audience: Send + Sync + 'static {
    const KIND: AccountKind;
    const ENROLLMENT: Enrollment;
    /// Access to `/get-all`.
    const MANAGE: Access;
    /// Access to `/get-by-id`, `/update` and `/delete`.
    const SELF: Access;

    type Create: AccountForm + DeserializeOwned + Send + 'static;
    type Update: AccountUpdateForm + DeserializeOwned + Send + 'static;
    type View: Serialize + Send;

    /// Expand referenced records for responses.
    async fn expand(
        pool: &PgPool,
        accounts: Vec<Account>,
    ) -> Result<Vec<Self::View>, RepositoryError>;
}

pub struct Admins;
pub struct Salesmen;
pub struct Clients;

#[async_trait]
impl Audience for Admins {
    const KIND: AccountKind = AccountKind::Admin;
    const ENROLLMENT: Enrollment = Enrollment::Staff(routes::ADMIN_MANAGE);
    const MANAGE: Access = routes::ADMIN_MANAGE;
    const SELF: Access = routes::ADMIN_SELF;

    type Create = forms::CreateAdminRequest;
    type Update = forms::UpdateAdminRequest;
    type View = Account;

    async fn expand(_pool: &PgPool, accounts: Vec<Account>) -> Result<Vec<Account>, RepositoryError> {
        Ok(accounts)
    }
}

#[async_trait]
impl Audience for Salesmen {
    const KIND: AccountKind = AccountKind::Salesman;
    const ENROLLMENT: Enrollment = Enrollment::Staff(routes::SALESMAN_MANAGE);
    const MANAGE: Access = routes::SALESMAN_MANAGE;
    const SELF: Access = routes::SALESMAN_SELF;

    type Create = forms::CreateProfileRequest;
    type Update = forms::UpdateProfileRequest;
    type View = SalesmanDetails;

    async fn expand(
        pool: &PgPool,
        accounts: Vec<Account>,
    ) -> Result<Vec<SalesmanDetails>, RepositoryError> {
        AccountRepository::new(pool).with_products(accounts).await
    }
}

#[async_trait]
impl Audience for Clients {
    const KIND: AccountKind = AccountKind::Client;
    const ENROLLMENT: Enrollment = Enrollment::SelfService;
    const MANAGE: Access = routes::CLIENT_MANAGE;
    const SELF: Access = routes::CLIENT_SELF;

    type Create = forms::CreateProfileRequest;
    type Update = forms::UpdateProfileRequest;
    type View = ClientDetails;

    async fn expand(
        pool: &PgPool,
        accounts: Vec<Account>,
    ) -> Result<Vec<ClientDetails>, RepositoryError> {
        AccountRepository::new(pool).with_purchases(accounts).await
    }
}

/// Build the router for one account kind.
pub fn router<K: Audience>() -> Router<AppState> {
    let router = Router::new()
        .route("/signin", post(auth::sign_in::<K>))
        .route("/confirm-signin", post(auth::confirm_sign_in::<K>))
        .route("/signout", post(auth::sign_out))
        .route("/send-verification", post(auth::send_verification::<K>))
        .route("/check-verification", patch(auth::check_verification::<K>))
        .route("/change-password", patch(auth::change_password::<K>))
        .route(
            "/send-forgot-password-code",
            post(auth::send_forgot_password_code::<K>),
        )
        .route(
            "/check-forgot-password-code",
            patch(auth::check_forgot_password_code::<K>),
        )
        .route("/get-all", get(manage::get_all::<K>))
        .route("/get-by-id", get(manage::get_by_id::<K>))
        .route("/update", patch(manage::update::<K>))
        .route("/delete", delete(manage::delete::<K>));

    match K::ENROLLMENT {
        Enrollment::Staff(_) => router.route("/create", post(manage::create::<K>)),
        Enrollment::SelfService => router.route("/signup", post(manage::sign_up::<K>)),
    }
}
