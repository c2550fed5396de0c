//! Per-request context handed to route middleware and actions.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::http::{MultipartData, Params, Request};
use crate::observability::metrics;
use crate::session::{Flash, Session};
use crate::storage::{Connection, Op, PersistentConnection, Snapshot, TxError};

/// The request's database access, when a database is configured.
#[derive(Debug, Clone)]
pub enum Database {
    /// Fresh in-memory connection, discarded with the request.
    Ephemeral(Connection),
    /// Log-backed connection; written back to the shared handle if one
    /// is in use.
    Persistent(PersistentConnection),
}

impl Database {
    pub fn snapshot(&self) -> Snapshot {
        match self {
            Database::Ephemeral(conn) => conn.snapshot(),
            Database::Persistent(conn) => conn.snapshot(),
        }
    }

    pub fn transact(&self, ops: &[Op]) -> Result<Database, TxError> {
        Ok(match self {
            Database::Ephemeral(conn) => Database::Ephemeral(conn.transact(ops)?),
            Database::Persistent(conn) => Database::Persistent(conn.transact(ops)?),
        })
    }
}

/// Error from an external template renderer.
#[derive(Debug, thiserror::Error)]
#[error("failed to render template '{template}': {message}")]
pub struct RenderError {
    pub template: String,
    pub message: String,
}

/// Template rendering collaborator. The pipeline only carries it.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, vars: &serde_json::Value) -> Result<String, RenderError>;
}

/// Opaque collaborator handles passed through to actions.
#[derive(Clone)]
pub struct Services {
    /// Span of the current request; log through it to keep request fields.
    pub span: tracing::Span,
    pub templates: Option<Arc<dyn TemplateRenderer>>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("span", &self.span)
            .field("templates", &self.templates.is_some())
            .finish()
    }
}

impl Default for Services {
    fn default() -> Self {
        Self {
            span: tracing::Span::none(),
            templates: None,
        }
    }
}

/// Everything an action needs about the request it is serving.
///
/// Actions take the context by value and hand it back with their response,
/// so any change to session, flash or database is visible in the return
/// value.
#[derive(Debug, Clone)]
pub struct Context {
    pub request: Request,
    pub session: Session,
    pub flash: Flash,
    pub params: Params,
    pub csrf_token: String,
    pub db: Option<Database>,
    pub multipart: Option<MultipartData>,
    pub services: Services,
}

impl Context {
    /// A context with an empty session and no database, for `request`.
    pub fn new(request: Request) -> Self {
        Self {
            params: Params::from_query(request.query()),
            request,
            session: Session::new(),
            flash: Flash::default(),
            csrf_token: String::new(),
            db: None,
            multipart: None,
            services: Services::default(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Parsed parameter, or `default` when missing or unparsable.
    pub fn param_or<T: FromStr>(&self, name: &str, default: T) -> T {
        self.params.parse_or(name, default)
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.db.as_ref().map(Database::snapshot)
    }

    /// Run a transaction and keep the resulting connection on success.
    pub fn transact(&mut self, ops: &[Op]) -> Result<(), TxError> {
        let db = self.db.as_ref().ok_or(TxError::NoDatabase)?;
        let next = db.transact(ops).inspect_err(|e| {
            tracing::warn!(error = %e, "Transaction rejected");
        })?;
        metrics::record_transaction();
        self.db = Some(next);
        Ok(())
    }

    /// Render through the configured template collaborator.
    pub fn render(&self, template: &str, vars: &serde_json::Value) -> Result<String, RenderError> {
        match &self.services.templates {
            Some(renderer) => renderer.render(template, vars),
            None => Err(RenderError {
                template: template.to_string(),
                message: "no template renderer configured".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    #[test]
    fn test_transact_without_database() {
        let mut ctx = Context::new(Request::new(Method::POST, "/"));
        let err = ctx.transact(&[Op::assert("a", "b", 1)]).unwrap_err();
        assert!(matches!(err, TxError::NoDatabase));
    }

    #[test]
    fn test_transact_replaces_connection() {
        let mut ctx = Context::new(Request::new(Method::POST, "/"));
        ctx.db = Some(Database::Ephemeral(Connection::new()));

        ctx.transact(&[Op::assert("a", "b", 1)]).unwrap();
        assert_eq!(ctx.snapshot().unwrap().value("a", "b"), Some(&json!(1)));

        assert!(ctx.transact(&[Op::retract("x", "y")]).is_err());
        assert_eq!(ctx.snapshot().unwrap().basis(), 1);
    }

    #[test]
    fn test_render_without_renderer() {
        let ctx = Context::new(Request::new(Method::GET, "/"));
        let err = ctx.render("index.html", &json!({})).unwrap_err();
        assert_eq!(err.template, "index.html");
    }

    #[test]
    fn test_param_or_default() {
        let ctx = Context::new(Request::new(Method::GET, "/?page=x"));
        assert_eq!(ctx.param_or("page", 1u32), 1);
    }
}
