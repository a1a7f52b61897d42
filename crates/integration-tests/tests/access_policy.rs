//! Router-level tests for authentication and the access table.
//!
//! Every request here is decided before a query is issued, so the lazily
//! connected pool is never used.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use storehouse_core::Role;
use storehouse_integration_tests::{RecordingMailer, account, bearer, test_state};

struct Harness {
    app: Router,
    admin: String,
    salesman: String,
    client: String,
}

fn harness() -> Harness {
    let state = test_state(Arc::new(RecordingMailer::default()));
    Harness {
        admin: bearer(&state, &account(2, Role::Admin)),
        salesman: bearer(&state, &account(3, Role::Salesman)),
        client: bearer(&state, &account(4, Role::Client)),
        app: storehouse_api::app(state),
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        request = request.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_owned());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookie, json)
}

fn category_body() -> Value {
    serde_json::json!({
        "name": "Outerwear",
        "description": "Jackets, coats and vests"
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let h = harness();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let h = harness();
    let (status, _, body) = send(&h.app, Method::GET, "/api/admin/get-all", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["message"], "Unauthorized user");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_non_bearer_credential_is_invalid() {
    let h = harness();
    let (status, _, body) =
        send(&h.app, Method::GET, "/api/client/get-all", Some("Token abc"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_forged_token_is_unauthorized() {
    let h = harness();
    let (status, _, body) = send(
        &h.app,
        Method::GET,
        "/api/client/get-all",
        Some("Bearer eyJhbGciOiJIUzI1NiJ9.e30.c2lnbmF0dXJl"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized user");
}

#[tokio::test]
async fn test_token_from_other_secret_is_unauthorized() {
    let h = harness();
    let mut config = storehouse_integration_tests::test_config();
    config.secrets.token_secret =
        secrecy::SecretString::from("a-different-Signing-secret-0f-enough-length");
    let foreign = storehouse_api::services::SessionTokens::new(&config.secrets.token_secret)
        .issue(&account(2, Role::SuperAdmin))
        .unwrap();

    let (status, _, _) = send(
        &h.app,
        Method::GET,
        "/api/admin/get-all",
        Some(&format!("Bearer {}", foreign.token)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Access table
// =============================================================================

#[tokio::test]
async fn test_admin_listing_is_superadmin_only() {
    let h = harness();
    let (status, _, body) =
        send(&h.app, Method::GET, "/api/admin/get-all", Some(&h.admin), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied");
}

#[tokio::test]
async fn test_clients_cannot_list_salesmen_or_clients() {
    let h = harness();
    for uri in ["/api/salesman/get-all", "/api/client/get-all"] {
        let (status, _, _) = send(&h.app, Method::GET, uri, Some(&h.client), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn test_client_cannot_read_another_client() {
    let h = harness();
    let (status, _, _) = send(
        &h.app,
        Method::GET,
        "/api/client/get-by-id?id=5",
        Some(&h.client),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_id_is_bad_request_once_authorized() {
    let h = harness();
    let (status, _, body) = send(
        &h.app,
        Method::GET,
        "/api/client/get-by-id?id=64b7f0c2",
        Some(&h.admin),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid object id");
}

#[tokio::test]
async fn test_client_cannot_write_catalog() {
    let h = harness();
    let (status, _, _) = send(
        &h.app,
        Method::POST,
        "/api/category/create",
        Some(&h.client),
        Some(category_body()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_catalog_writes_require_a_session() {
    let h = harness();
    let (status, _, _) = send(
        &h.app,
        Method::POST,
        "/api/category/create",
        None,
        Some(category_body()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sale_reads_are_salesman_only() {
    let h = harness();
    for auth in [&h.admin, &h.client] {
        let (status, _, _) =
            send(&h.app, Method::GET, "/api/sold-product/get-all", Some(auth), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn test_clients_cannot_record_sales() {
    let h = harness();
    let (status, _, _) = send(
        &h.app,
        Method::POST,
        "/api/sold-product/create",
        Some(&h.client),
        Some(serde_json::json!({"productId": 1, "clientId": 4, "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_salesman_cannot_create_salesmen() {
    let h = harness();
    let (status, _, _) = send(
        &h.app,
        Method::POST,
        "/api/salesman/create",
        Some(&h.salesman),
        Some(serde_json::json!({
            "username": "seller2",
            "fullName": "Second Seller",
            "email": "seller2@example.com",
            "phone": "+998901112233",
            "address": "Samarkand",
            "password": "Secret#123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_session_kind_must_match_audience() {
    let h = harness();
    let (status, _, body) = send(
        &h.app,
        Method::POST,
        "/api/admin/send-verification",
        Some(&h.client),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Admin does not exist");
}

// =============================================================================
// Request validation
// =============================================================================

#[tokio::test]
async fn test_malformed_json_is_unprocessable() {
    let h = harness();
    let (status, _, body) = send(
        &h.app,
        Method::POST,
        "/api/client/signin",
        None,
        Some(serde_json::json!({"username": "client1"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["statusCode"], 422);
    assert!(body["message"].as_str().unwrap().starts_with("Validation error:"));
}

#[tokio::test]
async fn test_category_lengths_are_validated_after_access() {
    let h = harness();
    let (status, _, body) = send(
        &h.app,
        Method::POST,
        "/api/category/create",
        Some(&h.salesman),
        Some(serde_json::json!({"name": "Hat", "description": "Hats of every kind"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("\"name\""));
}

// =============================================================================
// Sign-out
// =============================================================================

#[tokio::test]
async fn test_sign_out_clears_cookie() {
    let h = harness();
    let (status, cookie, body) =
        send(&h.app, Method::POST, "/api/client/signout", Some(&h.client), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Sign out successful");
    let cookie = cookie.unwrap();
    assert!(cookie.starts_with("Authorization="));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_cookie_session_is_accepted() {
    let h = harness();
    let token = h.client.trim_start_matches("Bearer ");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/client/signout")
        .header(header::COOKIE, format!("Authorization=Bearer%20{token}"))
        .body(Body::empty())
        .unwrap();

    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
