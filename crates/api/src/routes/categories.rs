//! Category routes.
//!
//! ```text
//! POST   /create          - Create a category (staff)
//! GET    /get-all         - Categories with their products
//! GET    /get-by-id?id=   - One category with its products
//! PATCH  /update?id=      - Partial update (staff)
//! DELETE /delete?id=      - Delete with products and their sales (staff)
//! ```

use axum::{
    Router,
    extract::State,
    routing::{delete, get, patch, post},
};
use serde::Deserialize;
use tracing::instrument;

use storehouse_core::{CategoryId, FieldError, access::routes};

use crate::db::{CascadeReport, CategoryChanges, CategoryRepository, RepositoryError};
use crate::error::AppError;
use crate::middleware::{IdQuery, RequireAuth, ValidJson, ValidQuery};
use crate::models::{Category, CategoryDetails};
use crate::response::ApiResponse;
use crate::routes::fields;
use crate::state::AppState;

fn name(raw: &str) -> Result<String, FieldError> {
    fields::text("name", raw, 5, 15)
}

fn description(raw: &str) -> Result<String, FieldError> {
    fields::text("description", raw, 15, 150)
}

fn not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Category not found".to_string()),
        other => other.into(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateCategoryRequest {
    fn validate(self) -> Result<CategoryChanges, FieldError> {
        Ok(CategoryChanges {
            name: fields::optional(self.name.as_deref(), name)?,
            description: fields::optional(self.description.as_deref(), description)?,
        })
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
    ValidJson(body): ValidJson<CreateCategoryRequest>,
) -> Result<ApiResponse<Category>, AppError> {
    caller.authorize(routes::CATALOG_WRITE, None)?;
    let name = name(&body.name)?;
    let description = description(&body.description)?;

    let category = CategoryRepository::new(state.pool())
        .create(&name, &description)
        .await?;

    tracing::info!(category_id = %category.id, "Category created");
    Ok(ApiResponse::created("Category created successfully", category))
}

async fn get_all(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<CategoryDetails>>, AppError> {
    let repo = CategoryRepository::new(state.pool());
    let categories = repo.list().await?;

    Ok(ApiResponse::success(repo.with_products(categories).await?))
}

async fn get_by_id(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
) -> Result<ApiResponse<CategoryDetails>, AppError> {
    let id: CategoryId = query.parse()?;
    let repo = CategoryRepository::new(state.pool());

    let category = repo
        .get_by_id(id)
        .await?
        .ok_or(RepositoryError::NotFound)
        .map_err(not_found)?;
    let details = repo
        .with_products(vec![category])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("expansion dropped the category".to_string()))?;

    Ok(ApiResponse::success(details))
}

#[instrument(skip_all, fields(caller = %caller.0.id))]
async fn update(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
    ValidJson(body): ValidJson<UpdateCategoryRequest>,
) -> Result<ApiResponse<Category>, AppError> {
    caller.authorize(routes::CATALOG_WRITE, None)?;
    let id: CategoryId = query.parse()?;
    let changes = body.validate()?;

    let category = CategoryRepository::new(state.pool())
        .update(id, &changes)
        .await
        .map_err(not_found)?;

    Ok(ApiResponse::ok("Category updated successfully", category))
}

#[instrument(skip_all, fields(caller = %caller.0.id))]
async fn remove(
    caller: RequireAuth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IdQuery>,
) -> Result<ApiResponse<CascadeReport>, AppError> {
    caller.authorize(routes::CATALOG_WRITE, None)?;
    let id: CategoryId = query.parse()?;

    let report = CategoryRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found)?;

    tracing::info!(
        category_id = %id,
        products = report.products,
        sold_products = report.sold_products,
        "Category deleted"
    );
    Ok(ApiResponse::ok("Category deleted successfully", report))
}
