//! End-to-end tests of the dispatch pipeline, driven without a socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::json;

use switchyard::config::DatabaseMode;
use switchyard::middleware::route::{action, map_context, require_session_key, Action};
use switchyard::middleware::transport;
use switchyard::storage::{Op, PersistentConnection, SharedConnection};
use switchyard::{demo, Context, NamedRoute, Pipeline, Request, Response};

mod common;
use common::*;

fn echo(name: &'static str) -> Action {
    action(move |ctx: Context| async move {
        let value = ctx.param(name).unwrap_or("-").to_string();
        (Response::text(value), ctx)
    })
}

fn label(text: &'static str) -> Action {
    action(move |ctx: Context| async move { (Response::text(text), ctx) })
}

#[tokio::test]
async fn test_literal_route_beats_variable_route() {
    let pipeline = Pipeline::builder(test_config())
        .route(NamedRoute::new("show", Method::GET, "/users/:id", label("show")))
        .route(NamedRoute::new("new", Method::GET, "/users/new", label("new")))
        .build()
        .unwrap();

    let response = pipeline.handle(get("/users/new", None)).await;
    assert_eq!(body_text(&response), "new");
    let response = pipeline.handle(get("/users/17", None)).await;
    assert_eq!(body_text(&response), "show");
}

#[tokio::test]
async fn test_param_precedence() {
    let mut config = test_config();
    config.csrf.enabled = false;
    let pipeline = Pipeline::builder(config)
        .route(NamedRoute::new("user", Method::GET, "/u/:id", echo("id")))
        .route(NamedRoute::new("form", Method::POST, "/p", echo("x")))
        .build()
        .unwrap();

    let response = pipeline.handle(get("/u/5?id=9", None)).await;
    assert_eq!(body_text(&response), "5");

    let response = pipeline.handle(post_form("/p?x=query", "x=body", None)).await;
    assert_eq!(body_text(&response), "query");

    let response = pipeline.handle(post_form("/p", "x=body", None)).await;
    assert_eq!(body_text(&response), "body");
}

#[tokio::test]
async fn test_csrf_rejection_runs_nothing() {
    let reached = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&reached);
    let pipeline = Pipeline::builder(test_config())
        .route(
            NamedRoute::new("save", Method::POST, "/save", label("saved")).with_middleware(map_context(
                move |ctx: Context| {
                    flag.store(true, Ordering::SeqCst);
                    ctx
                },
            )),
        )
        .build()
        .unwrap();

    let response = pipeline.handle(post_form("/save", "_csrf=wrong", None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!reached.load(Ordering::SeqCst));

    let token = csrf_for(None);
    let response = pipeline.handle(post_form("/save", &format!("_csrf={token}"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(reached.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_csrf_token_tracks_session() {
    let pipeline = Pipeline::builder(test_config()).router(demo::router()).build().unwrap();

    // Logging in changes the session, so the pre-login token stops working.
    let before = pipeline.handle(get("/login", None)).await;
    let cookie = session_cookie(&before).unwrap();
    let stale = csrf_for(Some(&cookie));

    let login = pipeline
        .handle(post_form("/login", &format!("_csrf={stale}&user=ada"), Some(&cookie)))
        .await;
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&login).unwrap();

    let rejected = pipeline
        .handle(post_form("/logout", &format!("_csrf={stale}"), Some(&cookie)))
        .await;
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);

    let fresh = csrf_for(Some(&cookie));
    let accepted = pipeline
        .handle(post_form("/logout", &format!("_csrf={fresh}"), Some(&cookie)))
        .await;
    assert_eq!(accepted.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_session_round_trip_and_tamper() {
    let pipeline = Pipeline::builder(test_config()).router(demo::router()).build().unwrap();

    let first = pipeline.handle(get("/", None)).await;
    assert!(body_text(&first).contains("visited 1 time"));
    let cookie = session_cookie(&first).unwrap();
    assert!(first.header("set-cookie").unwrap().contains("HttpOnly; SameSite=Lax"));

    let second = pipeline.handle(get("/", Some(&cookie))).await;
    assert!(body_text(&second).contains("visited 2 time"));

    let tampered = format!("{cookie}0");
    let reset = pipeline.handle(get("/", Some(&tampered))).await;
    assert!(body_text(&reset).contains("visited 1 time"));
}

#[tokio::test]
async fn test_flash_survives_exactly_one_request() {
    let pipeline = Pipeline::builder(test_config()).router(demo::router()).build().unwrap();

    let denied = pipeline.handle(get("/account", None)).await;
    assert_eq!(denied.status(), StatusCode::SEE_OTHER);
    assert_eq!(denied.header("location"), Some("/login"));
    let cookie = session_cookie(&denied).unwrap();

    let shown = pipeline.handle(get("/login", Some(&cookie))).await;
    assert!(body_text(&shown).contains("Please log in first"));
    let cookie = session_cookie(&shown).unwrap();

    let gone = pipeline.handle(get("/login", Some(&cookie))).await;
    assert!(!body_text(&gone).contains("Please log in first"));
}

#[tokio::test]
async fn test_guarded_route_after_login() {
    let pipeline = Pipeline::builder(test_config())
        .route(
            NamedRoute::new("account", Method::GET, "/account", label("secret"))
                .with_middleware(require_session_key("user", "/login", "error", "nope")),
        )
        .route(NamedRoute::new(
            "login",
            Method::POST,
            "/login",
            action(|mut ctx: Context| async move {
                ctx.session.insert("user", "ada");
                (Response::redirect("/account"), ctx)
            }),
        ))
        .build()
        .unwrap();

    let login = pipeline
        .handle(post_form("/login", &format!("_csrf={}", csrf_for(None)), None))
        .await;
    let cookie = session_cookie(&login).unwrap();

    let account = pipeline.handle(get("/account", Some(&cookie))).await;
    assert_eq!(body_text(&account), "secret");
}

#[tokio::test]
async fn test_multipart_fields_and_files() {
    let token = csrf_for(None);
    let body = format!(
        "preamble\r\n\
         --XyZ\r\nContent-Disposition: form-data; name=\"_csrf\"\r\n\r\n{token}\r\n\
         --XyZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nHoliday\r\n\
         --XyZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nhello\r\n\
         --XyZ--\r\n"
    );
    let request = Request::new(Method::POST, "/upload")
        .with_header("content-type", "multipart/form-data; boundary=XyZ")
        .with_body(body);

    let pipeline = Pipeline::builder(test_config()).router(demo::router()).build().unwrap();
    let response = pipeline.handle(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(&response);
    assert!(html.contains("<p>Holiday</p>"));
    assert!(html.contains("a.txt (text/plain, 5 bytes)"));
}

#[tokio::test]
async fn test_ephemeral_database_is_per_request() {
    let mut config = test_config();
    config.csrf.enabled = false;
    config.database.mode = DatabaseMode::Ephemeral;
    let pipeline = Pipeline::builder(config).router(demo::router()).build().unwrap();

    let created = pipeline.handle(post_form("/notes", "text=hello", None)).await;
    assert_eq!(created.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&created).unwrap();

    let listed = pipeline.handle(get("/notes", Some(&cookie))).await;
    let html = body_text(&listed);
    assert!(html.contains("Note saved"));
    assert!(!html.contains(">hello<"));
}

#[tokio::test]
async fn test_persistent_write_back_and_replay() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.csrf.enabled = false;
    config.database.mode = DatabaseMode::Persistent;
    config.database.log_path = Some(dir.path().join("notes.log"));

    let pipeline = Pipeline::builder(config.clone()).router(demo::router()).build().unwrap();
    pipeline.handle(post_form("/notes", "text=first+note", None)).await;

    let listed = pipeline.handle(get("/notes", None)).await;
    assert!(body_text(&listed).contains(">first note<"));

    // A fresh pipeline replays the log.
    let reopened = Pipeline::builder(config).router(demo::router()).build().unwrap();
    let listed = reopened.handle(get("/notes", None)).await;
    assert!(body_text(&listed).contains(">first note<"));
}

#[tokio::test]
async fn test_concurrent_writes_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let shared = SharedConnection::new(PersistentConnection::open(dir.path().join("tx.log")).unwrap());

    let mut config = test_config();
    config.csrf.enabled = false;
    let slow_write = action(|mut ctx: Context| async move {
        let id = ctx.param("id").unwrap_or_default().to_string();
        let result = ctx.transact(&[Op::assert(id, "seen", true)]);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let status = if result.is_ok() { StatusCode::OK } else { StatusCode::CONFLICT };
        (Response::text("done").with_status(status), ctx)
    });
    let pipeline = Pipeline::builder(config)
        .shared_connection(shared.clone())
        .route(NamedRoute::new("write", Method::POST, "/write/:id", slow_write))
        .build()
        .unwrap();

    let (a, b) = tokio::join!(
        pipeline.handle(post_form("/write/a", "", None)),
        pipeline.handle(post_form("/write/b", "", None)),
    );
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);

    let snapshot = shared.current().snapshot();
    assert_eq!(snapshot.basis(), 2);
    assert_eq!(snapshot.value("a", "seen"), Some(&json!(true)));
    assert_eq!(snapshot.value("b", "seen"), Some(&json!(true)));
}

fn retract_text(pause: Duration) -> Action {
    action(move |mut ctx: Context| async move {
        let result = ctx.transact(&[Op::retract("a", "text")]);
        tokio::time::sleep(pause).await;
        let status = if result.is_ok() { StatusCode::OK } else { StatusCode::CONFLICT };
        (Response::text("done").with_status(status), ctx)
    })
}

fn seeded_log(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("tx.log");
    PersistentConnection::open(&path)
        .unwrap()
        .transact(&[Op::assert("a", "text", "x")])
        .unwrap()
        .persist()
        .unwrap();
    path
}

#[tokio::test]
async fn test_timed_out_request_leaves_log_and_memory_in_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = seeded_log(&dir);
    let shared = SharedConnection::new(PersistentConnection::open(&path).unwrap());

    let mut config = test_config();
    config.csrf.enabled = false;
    let pipeline = Pipeline::builder(config)
        .shared_connection(shared.clone())
        .layer(transport::timeout(Duration::from_millis(20)))
        .route(NamedRoute::new("slow", Method::POST, "/slow", retract_text(Duration::from_millis(200))))
        .route(NamedRoute::new("del", Method::POST, "/del", retract_text(Duration::ZERO)))
        .build()
        .unwrap();

    let response = pipeline.handle(post_form("/slow", "", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(shared.current().snapshot().value("a", "text"), Some(&json!("x")));

    let response = pipeline.handle(post_form("/del", "", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let replayed = PersistentConnection::open(&path).unwrap();
    let current = shared.current();
    assert_eq!(replayed.basis(), current.basis());
    assert_eq!(replayed.snapshot().value("a", "text"), None);
    assert_eq!(current.snapshot().value("a", "text"), None);
}

#[tokio::test]
async fn test_unshared_persistent_writes_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let path = seeded_log(&dir);

    let mut config = test_config();
    config.csrf.enabled = false;
    config.database.mode = DatabaseMode::Persistent;
    config.database.shared = false;
    config.database.log_path = Some(path.clone());
    let pipeline = Pipeline::builder(config)
        .route(NamedRoute::new("del", Method::POST, "/del", retract_text(Duration::from_millis(20))))
        .build()
        .unwrap();
    assert!(pipeline.shared_connection().is_none());

    let (a, b) = tokio::join!(
        pipeline.handle(post_form("/del", "", None)),
        pipeline.handle(post_form("/del", "", None)),
    );
    let mut statuses = vec![a.status(), b.status()];
    statuses.sort_by_key(|status| status.as_u16());
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let replayed = PersistentConnection::open(&path).unwrap();
    assert_eq!(replayed.basis(), 2);
    assert_eq!(replayed.snapshot().value("a", "text"), None);
}

#[tokio::test]
async fn test_transport_middleware_wraps_dispatch() {
    fn explode() -> (Response, Context) {
        panic!("action failed")
    }
    let pipeline = Pipeline::builder(test_config())
        .layer(transport::request_id())
        .layer(transport::recover())
        .route(NamedRoute::new(
            "boom",
            Method::GET,
            "/boom",
            action(|_ctx: Context| async move { explode() }),
        ))
        .build()
        .unwrap();

    let response = pipeline.handle(get("/boom", None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.header("x-request-id").is_some());

    let response = pipeline.handle(get("/nowhere", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_static_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("robots.txt"), "User-agent: *").unwrap();

    let mut config = test_config();
    config.static_files.root = Some(dir.path().to_path_buf());
    let pipeline = Pipeline::builder(config)
        .route(NamedRoute::new("home", Method::GET, "/", label("home")))
        .build()
        .unwrap();

    let response = pipeline.handle(get("/robots.txt", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(&response), "User-agent: *");
    assert_eq!(response.header("content-type"), Some("text/plain"));

    let response = pipeline.handle(get("/missing.txt", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let post = pipeline.handle(post_form("/robots.txt", "", None)).await;
    assert_eq!(post.status(), StatusCode::NOT_FOUND);
}
