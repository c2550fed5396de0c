//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → pipeline.rs (session, flash, params, CSRF token, database)
//!     → Context
//!     → router lookup → CSRF check → route middleware → action
//!     → (Response, Context)
//!     → write-back, session cookie
//!     → Response
//!
//! No route:
//!     → static_files.rs (GET/HEAD) → 404
//! ```
//!
//! # Design Decisions
//! - State flows through an explicit Context value in and out of every
//!   action and route middleware
//! - Collaborators (template renderer, static files, shared connection)
//!   are injected through the builder, never globals

pub mod context;
pub mod pipeline;
pub mod static_files;

pub use context::{Context, Database, RenderError, Services, TemplateRenderer};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineError};
pub use static_files::{StaticDir, StaticFiles};
