//! Business logic services.
//!
//! - [`auth`] - Registration, two-step sign-in, verification and passwords
//! - [`codes`] - One-time code issuing and confirmation
//! - [`email`] - Mail transports and code emails
//! - [`tokens`] - Session token signing and verification

pub mod auth;
pub mod codes;
pub mod email;
pub mod tokens;

pub use auth::{AuthError, AuthService, Registration};
pub use codes::{CodeError, CodeIssuer, CodeStore, Clock, MokaCodeStore, SystemClock};
pub use email::{LogMailer, Mailer, SmtpMailer};
pub use tokens::{IssuedSession, SessionTokens, TokenError};
