//! Request orchestrator.
//!
//! # Responsibilities
//! - Turn a raw request into a [`Context`]: session, flash, params, CSRF
//!   token, database
//! - Resolve the route, enforce CSRF, run the route's middleware and action
//! - Write the database back and finalize the session cookie
//!
//! # Design Decisions
//! - The whole dispatch is one [`Handler`], so transport middleware wraps it
//!   like any other handler
//! - Shared persistent connections are checked out before the context is
//!   built and committed after the action returns; the checkout is the
//!   serialization point
//! - Without a shared handle, persistent mode holds a log lock from replay
//!   to persist instead
//! - Staged transactions reach the log only at write-back, so an abandoned
//!   request leaves both the log and the shared connection untouched
//! - Requests that never reach an action (no route, CSRF failure) leave the
//!   session cookie untouched and publish nothing

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderValue, Method};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::Instrument;

use super::context::{Context, Database, Services, TemplateRenderer};
use super::static_files::{StaticDir, StaticFiles};
use crate::config::{AppConfig, DatabaseMode};
use crate::http::multipart::{self, MultipartData};
use crate::http::{form, Params, Request, Response};
use crate::middleware::transport::{self, Handler, TransportMiddleware};
use crate::observability::metrics;
use crate::routing::{NamedRoute, Router};
use crate::security::csrf::{self, CSRF_HEADER};
use crate::session::cookie::find_cookie;
use crate::session::{self, Flash, Session, SetCookie};
use crate::storage::{Checkout, Connection, PersistentConnection, SharedConnection, StoreError};

/// Errors raised while assembling a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("persistent database mode requires database.log_path")]
    MissingLogPath,

    #[error("failed to open transaction log {path}: {source}")]
    OpenLog {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
}

/// Where each request's database comes from.
#[derive(Debug, Clone)]
enum DbSource {
    None,
    Ephemeral,
    /// Replay the log into a fresh connection per request. The lock is
    /// held from replay until the request's transactions are persisted.
    Replay {
        path: PathBuf,
        writer: Arc<Mutex<()>>,
    },
    Shared(SharedConnection),
}

/// What write-back has to release once the action returns.
enum WriteBack {
    Shared(Checkout),
    Log(OwnedMutexGuard<()>),
}

struct PipelineInner {
    config: AppConfig,
    router: Router,
    static_files: Option<Arc<dyn StaticFiles>>,
    db: DbSource,
    templates: Option<Arc<dyn TemplateRenderer>>,
}

/// Assembles a [`Pipeline`].
pub struct PipelineBuilder {
    config: AppConfig,
    router: Router,
    transport: Vec<TransportMiddleware>,
    static_files: Option<Arc<dyn StaticFiles>>,
    shared: Option<SharedConnection>,
    templates: Option<Arc<dyn TemplateRenderer>>,
}

impl PipelineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            transport: Vec::new(),
            static_files: None,
            shared: None,
            templates: None,
        }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn route(mut self, route: NamedRoute) -> Self {
        self.router.add(route);
        self
    }

    /// Add transport middleware; the first added is outermost.
    pub fn layer(mut self, middleware: TransportMiddleware) -> Self {
        self.transport.push(middleware);
        self
    }

    /// Override the static fallback (default: `static_files.root` if set).
    pub fn static_files(mut self, files: Arc<dyn StaticFiles>) -> Self {
        self.static_files = Some(files);
        self
    }

    /// Inject the shared connection instead of opening one from the config.
    pub fn shared_connection(mut self, shared: SharedConnection) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn templates(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.templates = Some(renderer);
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let db = match (self.shared, self.config.database.mode) {
            (Some(shared), _) => DbSource::Shared(shared),
            (None, DatabaseMode::None) => DbSource::None,
            (None, DatabaseMode::Ephemeral) => DbSource::Ephemeral,
            (None, DatabaseMode::Persistent) => {
                let path = self
                    .config
                    .database
                    .log_path
                    .clone()
                    .ok_or(PipelineError::MissingLogPath)?;
                if self.config.database.shared {
                    let conn = PersistentConnection::open(&path)
                        .map_err(|source| PipelineError::OpenLog { path, source })?;
                    DbSource::Shared(SharedConnection::new(conn))
                } else {
                    DbSource::Replay {
                        path,
                        writer: Arc::new(Mutex::new(())),
                    }
                }
            }
        };

        let static_files = self.static_files.or_else(|| {
            self.config
                .static_files
                .root
                .clone()
                .map(|root| Arc::new(StaticDir::new(root)) as Arc<dyn StaticFiles>)
        });

        tracing::info!(
            routes = self.router.routes().len(),
            transport_middleware = self.transport.len(),
            database = ?self.config.database.mode,
            static_files = static_files.is_some(),
            "Pipeline assembled"
        );

        let inner = Arc::new(PipelineInner {
            config: self.config,
            router: self.router,
            static_files,
            db,
            templates: self.templates,
        });

        let core = {
            let inner = Arc::clone(&inner);
            transport::handler(move |req: Request| dispatch(Arc::clone(&inner), req))
        };

        Ok(Pipeline {
            handler: transport::compose(&self.transport, core),
            inner,
        })
    }
}

/// The assembled dispatcher: transport middleware around [`dispatch`].
#[derive(Clone)]
pub struct Pipeline {
    handler: Handler,
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    pub fn builder(config: AppConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub async fn handle(&self, req: Request) -> Response {
        (self.handler)(req).await
    }

    pub fn handler(&self) -> Handler {
        Arc::clone(&self.handler)
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// The shared connection, if requests share one.
    pub fn shared_connection(&self) -> Option<&SharedConnection> {
        match &self.inner.db {
            DbSource::Shared(shared) => Some(shared),
            _ => None,
        }
    }
}

fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

async fn dispatch(inner: Arc<PipelineInner>, req: Request) -> Response {
    let span = tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.path(),
        request_id = req.request_id().unwrap_or("-"),
    );
    dispatch_in_span(inner, req, span.clone()).instrument(span).await
}

async fn dispatch_in_span(inner: Arc<PipelineInner>, req: Request, span: tracing::Span) -> Response {
    let config = &inner.config;
    let secret = config.session.secret.as_str();

    // Session and flash.
    let mut session = match req
        .header(COOKIE.as_str())
        .and_then(|header| find_cookie(header, &config.session.cookie_name))
    {
        Some(cookie) => session::decode(cookie, secret),
        None => Session::new(),
    };
    let flash = Flash::extract(&mut session);

    // Params: query first, then body.
    let mut params = Params::from_query(req.query());
    let mut multipart_data = None;
    let mut body_fields = Vec::new();
    if !matches!(*req.method(), Method::GET | Method::HEAD) {
        let content_type = req.header(CONTENT_TYPE.as_str()).unwrap_or_default();
        if multipart::is_multipart(content_type) {
            let data = MultipartData::parse(content_type, req.body());
            body_fields = data.field_pairs();
            multipart_data = Some(data);
        } else {
            body_fields = form::parse_urlencoded(req.body());
        }
    }
    // The CSRF token is never taken from the query string.
    let body_token = body_fields
        .iter()
        .find(|(name, _)| *name == config.csrf.form_field)
        .map(|(_, value)| value.clone());
    params.extend(body_fields);

    let csrf_token = csrf::generate_token(secret, &session);

    // Database. Persistent access stays locked until write-back.
    let mut write_back: Option<WriteBack> = None;
    let db = match &inner.db {
        DbSource::None => None,
        DbSource::Ephemeral => Some(Database::Ephemeral(Connection::new())),
        DbSource::Replay { path, writer } => {
            let permit = Arc::clone(writer).lock_owned().await;
            match PersistentConnection::open(path) {
                Ok(conn) => {
                    write_back = Some(WriteBack::Log(permit));
                    Some(Database::Persistent(conn))
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to open transaction log");
                    return Response::internal_error();
                }
            }
        }
        DbSource::Shared(shared) => {
            let held = shared.checkout().await;
            let conn = held.connection();
            write_back = Some(WriteBack::Shared(held));
            Some(Database::Persistent(conn))
        }
    };

    let mut ctx = Context {
        request: req,
        session,
        flash,
        params,
        csrf_token,
        db,
        multipart: multipart_data,
        services: Services {
            span,
            templates: inner.templates.clone(),
        },
    };

    // Route.
    let method = ctx.request.method().clone();
    let path = ctx.request.path().to_string();
    let Some(found) = inner.router.resolve(&method, &path) else {
        drop(write_back);
        return fallback(&inner, &method, &path).await;
    };
    let route = found.route;
    tracing::debug!(route = route.name(), bindings = ?found.bindings, "Route matched");
    ctx.params.prepend(found.bindings);

    // CSRF.
    if config.csrf.enabled && is_state_changing(route.method()) {
        let supplied = body_token.as_deref().or_else(|| ctx.request.header(CSRF_HEADER));
        let valid = supplied.is_some_and(|token| csrf::validate_token(token, secret, &ctx.session));
        if !valid {
            tracing::warn!(route = route.name(), token_present = supplied.is_some(), "CSRF validation failed");
            metrics::record_csrf_rejection();
            return Response::forbidden("Invalid CSRF token");
        }
    }

    // Action.
    let (mut response, ctx) = route.handler()(ctx).await;

    // Write-back.
    if let Some(write_back) = write_back {
        let result = match (&ctx.db, write_back) {
            (Some(Database::Persistent(conn)), WriteBack::Shared(checkout)) => checkout.commit(conn.clone()),
            (Some(Database::Persistent(conn)), WriteBack::Log(_permit)) => conn.persist().map(drop),
            _ => {
                tracing::warn!("Action dropped its persistent connection; nothing written back");
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::error!(route = route.name(), error = %e, "Failed to persist transactions");
            return Response::internal_error();
        }
    }

    // Finalize.
    let Context { mut session, flash, .. } = ctx;
    flash.merge_into(&mut session);
    let cookie = SetCookie::for_session(&config.session, session::encode(&session, secret));
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => response.append_header(SET_COOKIE, value),
        Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value"),
    }
    response
}

/// Static lookup for GET/HEAD, else 404.
async fn fallback(inner: &PipelineInner, method: &Method, path: &str) -> Response {
    if matches!(*method, Method::GET | Method::HEAD) {
        if let Some(files) = &inner.static_files {
            if let Some(response) = files.lookup(path).await {
                tracing::debug!("Served static file");
                return response;
            }
        }
    }
    tracing::debug!("No route matched");
    Response::not_found()
}
