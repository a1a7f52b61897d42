//! Storehouse Core - Shared domain types.
//!
//! This crate provides the types used across all Storehouse components:
//! - `api` - The retail management HTTP service
//! - `cli` - Command-line tools for migrations and account seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and lets the rules that
//! carry real invariants (stock arithmetic, access decisions) be tested
//! without any infrastructure.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, phones, usernames, roles and prices
//! - [`access`] - Role/self access policy evaluated before every protected action
//! - [`ledger`] - Stock arithmetic for recording and revising sales

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod access;
pub mod ledger;
pub mod types;

pub use access::{Access, AccessDenied};
pub use ledger::{LedgerError, SaleLine, Stock};
pub use types::*;
