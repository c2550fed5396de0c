//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! (method, path)
//!     → router.rs (filter by method, scan routes)
//!     → matcher.rs (segment match, bindings, specificity)
//!     → Return: most specific RouteMatch or None
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - Most literal segments wins; ties go to the first registered

pub mod matcher;
pub mod router;

pub use matcher::{Pattern, Specificity};
pub use router::{NamedRoute, RouteMatch, Router};
