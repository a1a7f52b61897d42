//! Product routes.
//!
//! ```text
//! POST   /create          - Create a product (staff)
//! GET    /get-all         - Products with category, salesman and sales
//! GET    /get-by-id?id=   - One product, expanded
//! PATCH  /update?id=      - Partial update (staff)
//! DELETE /delete?id=      - Delete with its sales (staff)
//! ```
//!
//! Referenced categories and salesmen are checked before writing so that a
//! bad reference is a 400 with a readable message rather than a foreign key
//! violation.

use axum::{
    Router,
    extract::State,
    routing::{delete, get, patch, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use storehouse_core::{
    AccountId, AccountKind, CategoryId, FieldError, Price, ProductId, access::routes,
};

use crate::db::{
    AccountRepository, CascadeReport, CategoryRepository, NewProduct, ProductChanges,
    ProductRepository, RepositoryError,
};
use crate::error::AppError;
use crate::middleware::{IdQuery, RequireAuth, ValidJson, ValidQuery};
use crate::models::{Product, ProductDetails};
use crate::response::ApiResponse;
use crate::routes::fields;
use crate::state::AppState;

fn name(raw: &str) -> Result<String, FieldError> {
    fields::text("name", raw, 5, 15)
}

fn description(raw: &str) -> Result<String, FieldError> {
    fields::text("description", raw, 15, 150)
}

fn color(raw: &str) -> Result<String, FieldError> {
    fields::text("color", raw, 1, 30)
}

fn quantity(value: i32) -> Result<i32, FieldError> {
    if value < 0 {
        return Err(FieldError::new(
            "quantity",
            "must be greater than or equal to 0",
        ));
    }
    Ok(value)
}

fn not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Product not found".to_string()),
        other => other.into(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub quantity: i32,
    pub color: String,
    pub category_id: i32,
    pub salesman_id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
    pub color: Option<String>,
    pub category_id: Option<i32>,
    pub salesman_id: Option<i32>,
}

impl UpdateProductRequest {
    fn validate(self) -> Result<ProductChanges, FieldError> {
        Ok(ProductChanges {
            name: fields::optional(self.name.as_deref(), name)?,
            description: fields::optional(self.description.as_deref(), description)?,
            price: fields::optional(self.price, Price::new)?,
            quantity: fields::optional(self.quantity, quantity)?,
            color: fields::optional(self.color.as_deref(), color)?,
            category_id: self.category_id.map(CategoryId::from),
            salesman_id: self.salesman_id.map(AccountId::from),
        })
    }
}

/// Check that the referenced category and salesman exist.
async fn ensure_references(
    state: &AppState,
    category_id: Option<CategoryId>,
    salesman_id: Option<AccountId>,
) -> Result<(), AppError> {
    if let Some(id) = salesman_id {
        let salesman = AccountRepository::new(state.pool())
            .get_by_id(AccountKind::Salesman, id)
            .await?;
        if salesman.is_none() {
            return Err(AppError::BadRequest("Salesman does not exist".to_string()));
        }
    }

    if let Some(id) = category_id {
        let category = CategoryRepository::new(state.pool()).get_by_id(id).await?;
        if category.is_none() {
            return Err(AppError::BadRequest("Category does not exist".to_string()));
        }
    }

    Ok(())
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
    ValidJson(body): ValidJson<CreateProductRequest>,
) -> Result<ApiResponse<Product>, AppError> {
    caller.authorize(routes::CATALOG_WRITE, None)?;

    let name = name(&body.name)?;
    let description = description(&body.description)?;
    let color = color(&body.color)?;
    let new = NewProduct {
        name: &name,
        description: &description,
        price: Price::new(body.price)?,
        quantity: quantity(body.quantity)?,
        color: &color,
        category_id: CategoryId::from(body.category_id),
        salesman_id: AccountId::from(body.salesman_id),
    };

    ensure_references(&state, Some(new.category_id), Some(new.salesman_id)).await?;

    let product = ProductRepository::new(state.pool()).create(&new).await?;

    tracing::info!(product_id = %product.id, quantity = product.quantity, "Product created");
    Ok(ApiResponse::created("Product created successfully", product))
}

async fn get_all(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<ProductDetails>>, AppError> {
    let repo = ProductRepository::new(state.pool());
    let products = repo.list().await?;

    Ok(ApiResponse::success(repo.with_details(products).await?))
}

async fn get_by_id(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
) -> Result<ApiResponse<ProductDetails>, AppError> {
    let id: ProductId = query.parse()?;
    let repo = ProductRepository::new(state.pool());

    let product = repo
        .get_by_id(id)
        .await?
        .ok_or(RepositoryError::NotFound)
        .map_err(not_found)?;
    let details = repo
        .with_details(vec![product])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("expansion dropped the product".to_string()))?;

    Ok(ApiResponse::success(details))
}

#[instrument(skip_all, fields(caller = %caller.0.id))]
async fn update(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
    ValidJson(body): ValidJson<UpdateProductRequest>,
) -> Result<ApiResponse<Product>, AppError> {
    caller.authorize(routes::CATALOG_WRITE, None)?;
    let id: ProductId = query.parse()?;
    let changes = body.validate()?;

    ensure_references(&state, changes.category_id, changes.salesman_id).await?;

    let product = ProductRepository::new(state.pool())
        .update(id, &changes)
        .await
        .map_err(not_found)?;

    Ok(ApiResponse::ok("Product updated successfully", product))
}

#[instrument(skip_all, fields(caller = %caller.0.id))]
async fn remove(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
) -> Result<ApiResponse<CascadeReport>, AppError> {
    caller.authorize(routes::CATALOG_WRITE, None)?;
    let id: ProductId = query.parse()?;

    let report = ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found)?;

    tracing::info!(
        product_id = %id,
        sold_products = report.sold_products,
        "Product deleted"
    );
    Ok(ApiResponse::ok("Product deleted successfully", report))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_body_uses_camel_case_references() {
        let body = r#"{
            "name": "Sneakers",
            "description": "Lightweight running shoes",
            "price": 49.5,
            "quantity": 10,
            "color": "white",
            "categoryId": 3,
            "salesmanId": 7
        }"#;
        let request: CreateProductRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.category_id, 3);
        assert_eq!(request.salesman_id, 7);
        assert_eq!(request.price, Decimal::new(495, 1));
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        assert!(quantity(0).is_ok());
        assert_eq!(quantity(-1).unwrap_err().field, "quantity");
    }

    #[test]
    fn test_update_rejects_negative_price() {
        let err = UpdateProductRequest {
            name: None,
            description: None,
            price: Some(Decimal::new(-1, 0)),
            quantity: None,
            color: None,
            category_id: None,
            salesman_id: None,
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "price");
    }

    #[test]
    fn test_update_rejects_fractional_cents() {
        let err = UpdateProductRequest {
            name: None,
            description: None,
            price: Some(Decimal::new(1_005, 3)),
            quantity: None,
            color: None,
            category_id: None,
            salesman_id: None,
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "price");
    }

    #[test]
    fn test_update_maps_references() {
        let changes = UpdateProductRequest {
            name: None,
            description: None,
            price: None,
            quantity: Some(4),
            color: None,
            category_id: Some(2),
            salesman_id: None,
        }
        .validate()
        .unwrap();
        assert_eq!(changes.quantity, Some(4));
        assert_eq!(changes.category_id, Some(CategoryId::new(2)));
        assert!(changes.salesman_id.is_none());
    }
}
