//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use switchyard::config::AppConfig;
use switchyard::security::csrf;
use switchyard::session::{self, Flash};
use switchyard::{HttpServer, Pipeline, Request, Response, Shutdown};

pub const SECRET: &str = "integration-secret";

/// Default config with a fixed secret.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.session.secret = SECRET.to_string();
    config
}

/// `name=value` of the session cookie set by `response`.
pub fn session_cookie(response: &Response) -> Option<String> {
    let set_cookie = response.header("set-cookie")?;
    set_cookie.split(';').next().map(|pair| pair.trim().to_string())
}

/// Value part of a `name=value` cookie pair.
pub fn cookie_value(pair: &str) -> &str {
    pair.split_once('=').map(|(_, v)| v).unwrap_or_default()
}

/// CSRF token the pipeline will expect for a request carrying `cookie`.
pub fn csrf_for(cookie: Option<&str>) -> String {
    let mut session = match cookie {
        Some(pair) => session::decode(cookie_value(pair), SECRET),
        None => switchyard::Session::new(),
    };
    Flash::extract(&mut session);
    csrf::generate_token(SECRET, &session)
}

/// GET with an optional cookie.
pub fn get(target: &str, cookie: Option<&str>) -> Request {
    let req = Request::new(axum::http::Method::GET, target);
    match cookie {
        Some(cookie) => req.with_header("cookie", cookie),
        None => req,
    }
}

/// URL-encoded form POST with an optional cookie; the body is used as is.
pub fn post_form(target: &str, body: &str, cookie: Option<&str>) -> Request {
    let req = Request::new(axum::http::Method::POST, target)
        .with_header("content-type", "application/x-www-form-urlencoded")
        .with_body(body.to_string());
    match cookie {
        Some(cookie) => req.with_header("cookie", cookie),
        None => req,
    }
}

pub fn body_text(response: &Response) -> String {
    String::from_utf8_lossy(response.body()).into_owned()
}

/// Serve `pipeline` on an ephemeral port.
pub async fn start_server(pipeline: Pipeline) -> (SocketAddr, Shutdown) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        HttpServer::new(pipeline)
            .run(listener, &server_shutdown)
            .await
            .unwrap();
    });
    (addr, shutdown)
}
