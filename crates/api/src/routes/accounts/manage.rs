//! Account CRUD handlers.

use axum::extract::State;
use tracing::instrument;

use storehouse_core::{Access, AccountId};

use super::forms::{AccountForm, AccountUpdateForm, ValidAccount};
use super::{Audience, Enrollment};
use crate::db::{AccountRepository, CascadeReport, RepositoryError};
use crate::error::AppError;
use crate::middleware::{IdQuery, RequireAuth, ValidJson, ValidQuery};
use crate::models::Account;
use crate::response::ApiResponse;
use crate::services::Registration;
use crate::state::AppState;

fn not_found<K: Audience>(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound(format!("{} not found", K::KIND.label())),
        other => other.into(),
    }
}

async fn register<K: Audience>(
    state: &AppState,
    body: K::Create,
) -> Result<ApiResponse<Account>, AppError> {
    let ValidAccount {
        username,
        full_name,
        email,
        phone,
        address,
        role,
        password,
    } = body.validate(K::KIND)?;

    let account = state
        .auth()
        .register(&Registration {
            username: &username,
            full_name: full_name.as_deref(),
            email: &email,
            phone: &phone,
            address: address.as_deref(),
            role,
            password: &password,
        })
        .await?;

    Ok(ApiResponse::created(
        format!("{} account created successfully", K::KIND.label()),
        account,
    ))
}

/// Create an account on behalf of someone else.
///
/// # Errors
///
/// Returns 403 unless the caller may create this kind of account, 400 if
/// the username, email or phone is taken.
#[instrument(skip_all, fields(caller = %caller.0.id))]
pub async fn create<K: Audience>(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<K::Create>,
) -> Result<ApiResponse<Account>, AppError> {
    let access = match K::ENROLLMENT {
        Enrollment::Staff(access) => access,
        Enrollment::SelfService => Access::roles(&[]),
    };
    caller.authorize(access, None)?;

    register::<K>(&state, body).await
}

/// Self-service sign-up.
///
/// # Errors
///
/// Returns 400 if the username, email or phone is taken.
#[instrument(skip_all)]
pub async fn sign_up<K: Audience>(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<K::Create>,
) -> Result<ApiResponse<Account>, AppError> {
    register::<K>(&state, body).await
}

/// List all accounts of this kind.
///
/// # Errors
///
/// Returns 403 unless the caller manages this kind.
#[instrument(skip_all, fields(caller = %caller.0.id))]
pub async fn get_all<K: Audience>(
    caller: RequireAuth,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<K::View>>, AppError> {
    caller.authorize(K::MANAGE, None)?;

    let accounts = AccountRepository::new(state.pool()).list(K::KIND).await?;
    let views = K::expand(state.pool(), accounts).await?;

    Ok(ApiResponse::success(views))
}

/// Get one account.
///
/// # Errors
///
/// Returns 403 unless the caller manages this kind or owns the account,
/// 400 for a malformed id and 404 if there is no such account.
#[instrument(skip_all, fields(caller = %caller.0.id))]
pub async fn get_by_id<K: Audience>(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
) -> Result<ApiResponse<K::View>, AppError> {
    caller.authorize(K::SELF, query.parse::<AccountId>().ok())?;
    let id: AccountId = query.parse()?;

    let account = AccountRepository::new(state.pool())
        .get_by_id(K::KIND, id)
        .await?
        .ok_or(RepositoryError::NotFound)
        .map_err(not_found::<K>)?;

    let view = K::expand(state.pool(), vec![account])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("expansion dropped the account".to_string()))?;

    Ok(ApiResponse::success(view))
}

/// Update an account. Any change resets its verification.
///
/// # Errors
///
/// Returns 403/400/404 as for [`get_by_id`], 422 for invalid fields and 400
/// if a new username, email or phone is taken.
#[instrument(skip_all, fields(caller = %caller.0.id))]
pub async fn update<K: Audience>(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
    ValidJson(body): ValidJson<K::Update>,
) -> Result<ApiResponse<Account>, AppError> {
    caller.authorize(K::SELF, query.parse::<AccountId>().ok())?;
    let id: AccountId = query.parse()?;
    let changes = body.validate()?;

    let account = AccountRepository::new(state.pool())
        .update(K::KIND, id, &changes)
        .await
        .map_err(not_found::<K>)?;

    tracing::info!(account_id = %id, "Account updated");
    Ok(ApiResponse::ok(
        format!("{} updated successfully", K::KIND.label()),
        account,
    ))
}

/// Delete an account and everything that depends on it.
///
/// # Errors
///
/// Returns 403/400/404 as for [`get_by_id`].
#[instrument(skip_all, fields(caller = %caller.0.id))]
pub async fn delete<K: Audience>(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
) -> Result<ApiResponse<CascadeReport>, AppError> {
    caller.authorize(K::SELF, query.parse::<AccountId>().ok())?;
    let id: AccountId = query.parse()?;

    let report = AccountRepository::new(state.pool())
        .delete(K::KIND, id)
        .await
        .map_err(not_found::<K>)?;

    Ok(ApiResponse::ok(
        format!("{} deleted successfully", K::KIND.label()),
        report,
    ))
}
