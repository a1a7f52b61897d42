//! Sign-in, verification and password handlers.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use storehouse_core::{Password, Username};

use super::Audience;
use super::forms::{
    ChangePasswordRequest, CodeRequest, ConfirmSignInRequest, ForgotPasswordRequest,
    ResetPasswordRequest, SignInRequest,
};
use crate::error::AppError;
use crate::middleware::{RequireAuth, ValidJson, cleared_session_cookie, session_cookie};
use crate::models::{Account, CurrentAccount};
use crate::response::ApiResponse;
use crate::routes::fields;
use crate::services::AuthError;
use crate::state::AppState;

/// Token returned by a completed sign-in.
#[derive(Debug, Serialize)]
pub struct SessionData {
    pub token: String,
}

/// Reject callers whose session belongs to another account kind.
fn same_kind<K: Audience>(caller: &CurrentAccount) -> Result<(), AppError> {
    if caller.role.kind() == K::KIND {
        Ok(())
    } else {
        Err(AuthError::UnknownAccount(K::KIND).into())
    }
}

/// Step one: check the password and mail a code.
///
/// # Errors
///
/// Returns 401 for unknown usernames and wrong passwords alike.
#[instrument(skip_all)]
pub async fn sign_in<K: Audience>(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<SignInRequest>,
) -> Result<ApiResponse<()>, AppError> {
    let username = Username::parse(&body.username)?;
    state
        .auth()
        .begin_sign_in(K::KIND, &username, &body.password)
        .await?;

    Ok(ApiResponse::done("Verification code sent successfully"))
}

/// Step two: exchange the code for a session token and cookie.
///
/// # Errors
///
/// Returns 400 "Verification code expired" if the code does not match.
#[instrument(skip_all)]
pub async fn confirm_sign_in<K: Audience>(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ConfirmSignInRequest>,
) -> Result<Response, AppError> {
    let username = Username::parse(&body.username)?;
    let code = body.provided_code.value()?;

    let session = state
        .auth()
        .complete_sign_in(K::KIND, &username, code)
        .await?;

    let cookie = session_cookie(&session, state.config().app_env)
        .map_err(|e| AppError::Internal(format!("session cookie: {e}")))?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        ApiResponse::ok(
            "Log in successful",
            SessionData {
                token: session.token,
            },
        ),
    )
        .into_response())
}

/// Clear the session cookie.
///
/// Tokens are stateless; a copied token stays valid until it expires.
pub async fn sign_out(RequireAuth(_caller): RequireAuth) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, cleared_session_cookie())],
        ApiResponse::done("Sign out successful"),
    )
}

/// Mail a verification code to the caller.
///
/// # Errors
///
/// Returns 400 "You are already verified" for verified accounts.
#[instrument(skip_all, fields(account_id = %caller.0.id))]
pub async fn send_verification<K: Audience>(
    caller: RequireAuth,
    State(state): State<AppState>,
) -> Result<ApiResponse<()>, AppError> {
    same_kind::<K>(&caller.0)?;
    state.auth().request_verification(&caller.0).await?;

    Ok(ApiResponse::done("Verification code sent successfully"))
}

/// Verify the caller's account.
///
/// # Errors
///
/// Returns 400 "Verification code expired" if the code does not match.
#[instrument(skip_all, fields(account_id = %caller.0.id))]
pub async fn check_verification<K: Audience>(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CodeRequest>,
) -> Result<ApiResponse<()>, AppError> {
    same_kind::<K>(&caller.0)?;
    let code = body.provided_code.value()?;
    state.auth().confirm_verification(&caller.0, code).await?;

    Ok(ApiResponse::done("Account has been verified"))
}

/// Change the caller's password.
///
/// # Errors
///
/// Returns 400 if the new password equals the old one or the old one is wrong.
#[instrument(skip_all, fields(account_id = %caller.0.id))]
pub async fn change_password<K: Audience>(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ChangePasswordRequest>,
) -> Result<ApiResponse<Account>, AppError> {
    same_kind::<K>(&caller.0)?;
    let new_password = Password::parse("newPassword", &body.new_password)?;

    let account = state
        .auth()
        .change_password(&caller.0, &body.old_password, &new_password)
        .await?;

    Ok(ApiResponse::ok("Password updated successfully", account))
}

/// Mail a password reset code.
///
/// # Errors
///
/// Returns 400 if no account of this kind uses the address.
#[instrument(skip_all)]
pub async fn send_forgot_password_code<K: Audience>(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ForgotPasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    let email = fields::email(&body.email)?;
    state.auth().send_reset_code(K::KIND, &email).await?;

    Ok(ApiResponse::done("Verification code sent successfully"))
}

/// Reset the password with a mailed code.
///
/// # Errors
///
/// Returns 400 "Verification code expired" if the code does not match.
#[instrument(skip_all)]
pub async fn check_forgot_password_code<K: Audience>(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ResetPasswordRequest>,
) -> Result<ApiResponse<Account>, AppError> {
    let email = fields::email(&body.email)?;
    let code = body.provided_code.value()?;
    let new_password = Password::parse("newPassword", &body.new_password)?;

    let account = state
        .auth()
        .reset_password(K::KIND, &email, code, &new_password)
        .await?;

    Ok(ApiResponse::ok("Password is reset successfully", account))
}
