//! Domain models for the API.
//!
//! Responses serialize with camelCase field names. Password hashes live only
//! on [`AccountCredentials`] and are never serialized.

pub mod account;
pub mod catalog;
pub mod session;

pub use account::{Account, AccountCredentials, ClientDetails, SalesmanDetails};
pub use catalog::{Category, CategoryDetails, Product, ProductDetails, Sale, SaleDetails};
pub use session::CurrentAccount;
