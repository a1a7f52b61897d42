//! Sold product routes: the HTTP face of the inventory ledger.
//!
//! ```text
//! POST   /create          - Record a sale (staff)
//! GET    /get-all         - Sales with product and client (salesmen)
//! GET    /get-by-id?id=   - One sale, expanded (salesmen)
//! PATCH  /update?id=      - Revise product, client or quantity (staff)
//! DELETE /delete?id=      - Delete; stock is not restored (staff)
//! ```

use axum::{
    Router,
    extract::State,
    routing::{delete, get, patch, post},
};
use serde::Deserialize;
use tracing::instrument;

use storehouse_core::{AccountId, ProductId, SaleId, access::routes};

use crate::db::{SaleRepository, SaleRevision};
use crate::error::AppError;
use crate::middleware::{IdQuery, RequireAuth, ValidJson, ValidQuery};
use crate::models::{Sale, SaleDetails};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordSaleRequest {
    pub product_id: i32,
    pub client_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReviseSaleRequest {
    pub product_id: Option<i32>,
    pub client_id: Option<i32>,
    pub quantity: Option<i32>,
}

impl From<ReviseSaleRequest> for SaleRevision {
    fn from(body: ReviseSaleRequest) -> Self {
        Self {
            product_id: body.product_id.map(ProductId::from),
            client_id: body.client_id.map(AccountId::from),
            quantity: body.quantity,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/get-all", get(get_all))
        .route("/get-by-id", get(get_by_id))
        .route("/update", patch(update))
        .route("/delete", delete(remove))
}

#[instrument(skip_all, fields(caller = %caller.0.id))]
async fn create(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RecordSaleRequest>,
) -> Result<ApiResponse<Sale>, AppError> {
    caller.authorize(routes::SALE_WRITE, None)?;

    let sale = SaleRepository::new(state.pool())
        .record(
            ProductId::from(body.product_id),
            AccountId::from(body.client_id),
            body.quantity,
        )
        .await?;

    Ok(ApiResponse::created("Sold product created successfully", sale))
}

#[instrument(skip_all, fields(caller = %caller.0.id))]
async fn get_all(
    caller: RequireAuth,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<SaleDetails>>, AppError> {
    caller.authorize(routes::SALE_READ, None)?;

    let repo = SaleRepository::new(state.pool());
    let sales = repo.list().await?;

    Ok(ApiResponse::success(repo.with_details(sales).await?))
}

#[instrument(skip_all, fields(caller = %caller.0.id))]
async fn get_by_id(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
) -> Result<ApiResponse<SaleDetails>, AppError> {
    caller.authorize(routes::SALE_READ, None)?;
    let id: SaleId = query.parse()?;
    let repo = SaleRepository::new(state.pool());

    let sale = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Sold product not found".to_string()))?;
    let details = repo
        .with_details(vec![sale])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("expansion dropped the sale".to_string()))?;

    Ok(ApiResponse::success(details))
}

#[instrument(skip_all, fields(caller = %caller.0.id))]
async fn update(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
    ValidJson(body): ValidJson<ReviseSaleRequest>,
) -> Result<ApiResponse<Sale>, AppError> {
    caller.authorize(routes::SALE_WRITE, None)?;
    let id: SaleId = query.parse()?;

    let sale = SaleRepository::new(state.pool())
        .revise(id, body.into())
        .await?;

    Ok(ApiResponse::ok("Sold product updated successfully", sale))
}

#[instrument(skip_all, fields(caller = %caller.0.id))]
async fn remove(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
) -> Result<ApiResponse<()>, AppError> {
    caller.authorize(routes::SALE_WRITE, None)?;
    let id: SaleId = query.parse()?;

    SaleRepository::new(state.pool()).delete(id).await?;

    tracing::info!(sale_id = %id, "Sale deleted");
    Ok(ApiResponse::done("Sold product deleted successfully"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_body_requires_all_fields() {
        let body = r#"{"productId": 1, "clientId": 2}"#;
        assert!(serde_json::from_str::<RecordSaleRequest>(body).is_err());

        let body = r#"{"productId": 1, "clientId": 2, "quantity": 3}"#;
        let request: RecordSaleRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.quantity, 3);
    }

    #[test]
    fn test_revision_keeps_absent_fields_empty() {
        let body = r#"{"quantity": 5}"#;
        let request: ReviseSaleRequest = serde_json::from_str(body).unwrap();
        let revision = SaleRevision::from(request);

        assert!(revision.product_id.is_none());
        assert!(revision.client_id.is_none());
        assert_eq!(revision.quantity, Some(5));
    }
}
