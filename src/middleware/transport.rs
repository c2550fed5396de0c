//! Transport middleware: `Handler → Handler` over raw requests/responses.
//!
//! # Responsibilities
//! - Define the handler and middleware shapes
//! - Compose a middleware list around the dispatch handler
//! - Provide the stock transport middleware (recover, timeout, request id,
//!   access log)
//!
//! # Design Decisions
//! - Right fold: the first registered middleware is outermost, so it sees
//!   the request first and the response last
//! - Runs before any Context exists; it never sees parsed params or the
//!   session

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderValue, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::request::X_REQUEST_ID;
use crate::http::{Request, Response};
use crate::observability::metrics;

/// Turns a request into a response.
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wraps a handler in another handler.
pub type TransportMiddleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Build a [`Handler`] from an async closure.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req| f(req).boxed())
}

/// Build a [`TransportMiddleware`] from a closure.
pub fn middleware<F>(f: F) -> TransportMiddleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap `inner` so that `layers[0]` is outermost.
pub fn compose(layers: &[TransportMiddleware], inner: Handler) -> Handler {
    layers.iter().rev().fold(inner, |next, layer| layer(next))
}

/// Convert a panic anywhere below into a 500.
pub fn recover() -> TransportMiddleware {
    middleware(|next: Handler| {
        handler(move |req: Request| {
            let next = Arc::clone(&next);
            async move {
                match AssertUnwindSafe(async move { next(req).await }).catch_unwind().await {
                    Ok(response) => response,
                    Err(_) => {
                        tracing::error!("Handler panicked, responding 500");
                        Response::internal_error()
                    }
                }
            }
        })
    })
}

/// Respond 503 if the wrapped handler takes longer than `limit`.
pub fn timeout(limit: Duration) -> TransportMiddleware {
    middleware(move |next: Handler| {
        handler(move |req: Request| {
            let next = Arc::clone(&next);
            async move {
                match tokio::time::timeout(limit, next(req)).await {
                    Ok(response) => response,
                    Err(_) => {
                        tracing::warn!(timeout_ms = limit.as_millis() as u64, "Request timed out");
                        Response::new(StatusCode::SERVICE_UNAVAILABLE, "Request timed out")
                    }
                }
            }
        })
    })
}

/// Ensure every request carries `x-request-id` and echo it on the response.
pub fn request_id() -> TransportMiddleware {
    middleware(|next: Handler| {
        handler(move |mut req: Request| {
            let next = Arc::clone(&next);
            async move {
                let id = match req.request_id() {
                    Some(existing) => existing.to_string(),
                    None => uuid::Uuid::new_v4().to_string(),
                };
                let value = HeaderValue::from_str(&id).ok();
                if let Some(value) = &value {
                    req.headers_mut().insert(X_REQUEST_ID, value.clone());
                }
                let mut response = next(req).await;
                if let Some(value) = value {
                    response.headers_mut().insert(X_REQUEST_ID, value);
                }
                response
            }
        })
    })
}

/// Log one line per request and record request metrics.
pub fn access_log() -> TransportMiddleware {
    middleware(|next: Handler| {
        handler(move |req: Request| {
            let next = Arc::clone(&next);
            async move {
                let start = Instant::now();
                let method = req.method().clone();
                let path = req.path().to_string();
                let response = next(req).await;
                let status = response.status();

                tracing::info!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Request completed"
                );
                metrics::record_request(method.as_str(), status.as_u16(), start);
                response
            }
        })
    })
}
