//! Core types for Storehouse.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod account;
pub mod email;
pub mod id;
pub mod price;
pub mod role;

pub use account::{FieldError, Password, Phone, Username, check_length};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::Price;
pub use role::{AccountKind, Role};
