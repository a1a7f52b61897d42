//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! /api/admin/...          - Admins and the super admin (see `accounts`)
//! /api/salesman/...       - Salesmen
//! /api/client/...         - Clients (self-service sign-up)
//! /api/category/...       - Categories
//! /api/product/...        - Products
//! /api/sold-product/...   - Sold products (inventory ledger)
//! ```
//!
//! `/health` and `/health/ready` are mounted by the binary.

pub mod accounts;
pub mod categories;
pub mod fields;
pub mod products;
pub mod sales;

use axum::Router;

use crate::state::AppState;
use accounts::{Admins, Clients, Salesmen};

/// Build the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/admin", accounts::router::<Admins>())
        .nest("/api/salesman", accounts::router::<Salesmen>())
        .nest("/api/client", accounts::router::<Clients>())
        .nest("/api/category", categories::router())
        .nest("/api/product", products::router())
        .nest("/api/sold-product", sales::router())
}
