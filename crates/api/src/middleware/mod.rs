//! HTTP middleware and extractors.
//!
//! - [`auth`] - Session extractor and access checks
//! - [`session`] - Session cookie builders
//! - [`validate`] - JSON and query extractors with 422 rejections

pub mod auth;
pub mod session;
pub mod validate;

pub use auth::RequireAuth;
pub use session::{SESSION_COOKIE_NAME, cleared_session_cookie, session_cookie};
pub use validate::{IdQuery, ValidJson, ValidQuery};
