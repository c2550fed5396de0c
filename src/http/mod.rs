//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, body limit, conversion)
//!     → request.rs (method, target, headers, buffered body)
//!     → form.rs / multipart.rs (params, uploads)
//!     → [dispatch pipeline]
//!     → response.rs (status, headers, body)
//!     → Send to client
//! ```

pub mod form;
pub mod multipart;
pub mod request;
pub mod response;
pub mod server;

pub use form::Params;
pub use multipart::{MultipartData, MultipartPart};
pub use request::{Request, X_REQUEST_ID};
pub use response::Response;
pub use server::{HttpServer, ServerError};
