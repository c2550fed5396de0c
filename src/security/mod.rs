//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Session contents + secret
//!     → signing.rs (keyed hash over secret ‖ payload)
//!     → session codec (cookie signature)
//!     → csrf.rs (token derived from session contents)
//!
//! State-changing request:
//!     → csrf.rs validates submitted token
//!     → mismatch: 403 before any route middleware runs
//! ```
//!
//! # Design Decisions
//! - Pure functions only; safe under any concurrency
//! - Fail closed on CSRF, fail open (empty session) on bad cookies

pub mod csrf;
pub mod signing;

pub use csrf::{generate_token, validate_token, CSRF_FORM_FIELD, CSRF_HEADER};
