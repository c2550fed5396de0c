//! Middleware composition.
//!
//! # Data Flow
//! ```text
//! raw Request
//!     → transport.rs chain (recover, timeout, request id, access log, ...)
//!     → pipeline dispatch (session, params, routing, CSRF)
//!     → route.rs chain of the matched route (guards, context rewriters)
//!     → action
//! ```
//!
//! # Design Decisions
//! - Two separate layers over different domains: transport middleware sees
//!   raw requests and responses only; route middleware sees the parsed
//!   Context only
//! - Both compose by right fold, first registered = outermost

pub mod route;
pub mod transport;

pub use route::{Action, RouteMiddleware};
pub use transport::{Handler, TransportMiddleware};
