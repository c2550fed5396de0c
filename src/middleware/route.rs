//! Route middleware: `Action → Action` over the parsed [`Context`].
//!
//! Route middleware is attached to a single route and composed the same way
//! as transport middleware: the first one attached is outermost. It sees the
//! parsed context but never the raw transport.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::dispatch::Context;
use crate::http::Response;

/// Application logic for a route. Takes the context and gives it back with
/// the response.
pub type Action = Arc<dyn Fn(Context) -> BoxFuture<'static, (Response, Context)> + Send + Sync>;

/// Wraps an action in another action.
pub type RouteMiddleware = Arc<dyn Fn(Action) -> Action + Send + Sync>;

/// Build an [`Action`] from an async closure.
pub fn action<F, Fut>(f: F) -> Action
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Response, Context)> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Build a [`RouteMiddleware`] from a closure.
pub fn middleware<F>(f: F) -> RouteMiddleware
where
    F: Fn(Action) -> Action + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap `inner` so that `layers[0]` is outermost.
pub fn compose(layers: &[RouteMiddleware], inner: Action) -> Action {
    layers.iter().rev().fold(inner, |next, layer| layer(next))
}

/// Run the wrapped action only when `predicate` holds. Otherwise queue a
/// flash message under `flash_key` and redirect to `redirect_to`.
pub fn guard<P>(
    predicate: P,
    redirect_to: impl Into<String>,
    flash_key: impl Into<String>,
    flash_msg: impl Into<String>,
) -> RouteMiddleware
where
    P: Fn(&Context) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    let redirect_to: Arc<str> = redirect_to.into().into();
    let flash_key: Arc<str> = flash_key.into().into();
    let flash_msg: Arc<str> = flash_msg.into().into();

    middleware(move |next: Action| {
        let predicate = Arc::clone(&predicate);
        let redirect_to = Arc::clone(&redirect_to);
        let flash_key = Arc::clone(&flash_key);
        let flash_msg = Arc::clone(&flash_msg);
        action(move |mut ctx: Context| {
            let next = Arc::clone(&next);
            let allowed = predicate(&ctx);
            let redirect_to = Arc::clone(&redirect_to);
            let flash_key = Arc::clone(&flash_key);
            let flash_msg = Arc::clone(&flash_msg);
            async move {
                if allowed {
                    return next(ctx).await;
                }
                tracing::debug!(path = ctx.request.path(), redirect = %redirect_to, "Guard rejected request");
                ctx.flash.set(&*flash_key, &*flash_msg);
                (Response::redirect(&redirect_to), ctx)
            }
        })
    })
}

/// Guard that requires `key` to be present in the session.
pub fn require_session_key(
    key: impl Into<String>,
    redirect_to: impl Into<String>,
    flash_key: impl Into<String>,
    flash_msg: impl Into<String>,
) -> RouteMiddleware {
    let key = key.into();
    guard(
        move |ctx: &Context| ctx.session.contains_key(&key),
        redirect_to,
        flash_key,
        flash_msg,
    )
}

/// Rewrite the context before the wrapped action runs.
pub fn map_context<F>(f: F) -> RouteMiddleware
where
    F: Fn(Context) -> Context + Send + Sync + 'static,
{
    let f = Arc::new(f);
    middleware(move |next: Action| {
        let f = Arc::clone(&f);
        action(move |ctx: Context| {
            let next = Arc::clone(&next);
            let ctx = f(ctx);
            async move { next(ctx).await }
        })
    })
}

/// Rewrite the context with async work (e.g. loading a record) before the
/// wrapped action runs.
pub fn and_then_context<F, Fut>(f: F) -> RouteMiddleware
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Context> + Send + 'static,
{
    let f = Arc::new(f);
    middleware(move |next: Action| {
        let f = Arc::clone(&f);
        action(move |ctx: Context| {
            let next = Arc::clone(&next);
            let rewritten = f(ctx);
            async move { next(rewritten.await).await }
        })
    })
}
