//! Switchyard: a request dispatch pipeline for server-rendered web apps.
//!
//! Turns raw HTTP requests into a parsed [`Context`] (signed-cookie session,
//! flash messages, merged params, CSRF token, database connection), routes
//! it to the most specific matching action through two layers of
//! middleware, and finalizes the response with a re-signed session cookie.

pub mod config;
pub mod demo;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod routing;
pub mod security;
pub mod session;
pub mod storage;

pub use config::AppConfig;
pub use dispatch::{Context, Pipeline, PipelineBuilder};
pub use http::{HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::{NamedRoute, Router};
pub use session::Session;
