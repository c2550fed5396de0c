//! HTTP server setup.
//!
//! # Responsibilities
//! - Bind the configured address
//! - Create the Axum router with a single fallback into the pipeline
//! - Buffer request bodies up to the configured limit
//! - Convert between Axum and pipeline request/response values
//! - Serve until the shutdown coordinator fires

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_LENGTH, StatusCode},
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ListenerConfig;
use crate::dispatch::Pipeline;
use crate::http::{Request, Response};
use crate::lifecycle::Shutdown;

/// Errors from binding or serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid bind address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Bind the configured address.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ServerError> {
    let address: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|source| ServerError::Address {
            address: config.bind_address.clone(),
            source,
        })?;

    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind { address, source })?;

    tracing::info!(address = %listener.local_addr()?, "Listener bound");
    Ok(listener)
}

/// Handler state.
#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
    max_body_bytes: usize,
}

/// HTTP server in front of a [`Pipeline`].
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(pipeline: Pipeline) -> Self {
        let state = AppState {
            max_body_bytes: pipeline.config().listener.max_body_bytes,
            pipeline,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The Axum router, for embedding or testing.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `listener` until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut signal = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = signal.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn dispatch_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > state.max_body_bytes) {
        return payload_too_large(state.max_body_bytes);
    }

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return payload_too_large(state.max_body_bytes);
        }
    };

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let request = Request::from_parts(parts.method, target, parts.headers, body);

    into_axum(state.pipeline.handle(request).await)
}

fn payload_too_large(limit: usize) -> axum::response::Response {
    tracing::warn!(limit, "Request body exceeds limit");
    (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
}

fn into_axum(response: Response) -> axum::response::Response {
    let (status, headers, body) = response.into_parts();
    let mut out = axum::response::Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::dispatch::Context;
    use crate::middleware::route::action;
    use crate::routing::NamedRoute;
    use axum::http::Method;
    use tower::ServiceExt;

    fn server(max_body_bytes: usize) -> Router {
        let mut config = AppConfig::default();
        config.session.secret = "server-secret".to_string();
        config.csrf.enabled = false;
        config.listener.max_body_bytes = max_body_bytes;

        let echo = action(|ctx: Context| async move {
            let body = format!("{}:{}", ctx.param("q").unwrap_or("-"), ctx.request.body().len());
            (Response::text(body), ctx)
        });
        let pipeline = Pipeline::builder(config)
            .route(NamedRoute::new("echo", Method::POST, "/echo", echo))
            .build()
            .unwrap();
        HttpServer::new(pipeline).into_router()
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/echo?q=hi")
            .body(Body::from("abc"))
            .unwrap();

        let response = server(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("set-cookie"));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hi:3");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();

        let response = server(16).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
