//! Demo application served by the `switchyard` binary.
//!
//! A visit counter kept in the session, a notes board backed by the
//! configured database, a multipart upload summary, and a login-guarded
//! account page.

use axum::http::Method;
use serde_json::Value;

use crate::dispatch::Context;
use crate::middleware::route::{action, require_session_key, Action};
use crate::routing::{NamedRoute, Router};
use crate::security::CSRF_FORM_FIELD;
use crate::storage::Op;
use crate::http::Response;

/// Routes of the demo application.
pub fn router() -> Router {
    Router::new()
        .route(NamedRoute::new("home", Method::GET, "/", home()))
        .route(NamedRoute::new("notes", Method::GET, "/notes", list_notes()))
        .route(NamedRoute::new("create_note", Method::POST, "/notes", create_note()))
        .route(NamedRoute::new("show_note", Method::GET, "/notes/:id", show_note()))
        .route(NamedRoute::new("upload_form", Method::GET, "/upload", upload_form()))
        .route(NamedRoute::new("upload", Method::POST, "/upload", upload()))
        .route(NamedRoute::new("login_form", Method::GET, "/login", login_form()))
        .route(NamedRoute::new("login", Method::POST, "/login", login()))
        .route(NamedRoute::new("logout", Method::POST, "/logout", logout()))
        .route(
            NamedRoute::new("account", Method::GET, "/account", account()).with_middleware(
                require_session_key("user", "/login", "error", "Please log in first"),
            ),
        )
}

/// Minimal HTML escaping for interpolated text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(ctx: &Context, title: &str, body: &str) -> Response {
    let mut banner = String::new();
    for (key, message) in ctx.flash.current() {
        banner.push_str(&format!("<p class=\"flash {}\">{}</p>", escape(key), escape(message)));
    }
    Response::html(format!(
        "<!doctype html><html><head><title>{title}</title></head><body>\
         <nav><a href=\"/\">home</a> <a href=\"/notes\">notes</a> \
         <a href=\"/upload\">upload</a> <a href=\"/account\">account</a></nav>\
         {banner}<h1>{title}</h1>{body}</body></html>",
        title = escape(title),
    ))
}

fn csrf_field(ctx: &Context) -> String {
    format!(
        "<input type=\"hidden\" name=\"{CSRF_FORM_FIELD}\" value=\"{}\">",
        escape(&ctx.csrf_token)
    )
}

fn home() -> Action {
    action(|mut ctx: Context| async move {
        let visits = ctx.session.get("visits").and_then(|v| v.parse::<u64>().ok()).unwrap_or(0) + 1;
        ctx.session.insert("visits", visits.to_string());
        let body = format!("<p>You have visited {visits} time(s).</p>");
        (page(&ctx, "Switchyard", &body), ctx)
    })
}

fn list_notes() -> Action {
    action(|ctx: Context| async move {
        let Some(snapshot) = ctx.snapshot() else {
            return (page(&ctx, "Notes", "<p>No database configured.</p>"), ctx);
        };

        let mut items = String::new();
        for id in snapshot.entities_with("text") {
            let text = snapshot.value(id, "text").and_then(Value::as_str).unwrap_or_default();
            items.push_str(&format!(
                "<li><a href=\"/notes/{id}\">{}</a></li>",
                escape(text),
                id = escape(id)
            ));
        }
        let body = format!(
            "<ul>{items}</ul><form method=\"post\" action=\"/notes\">{}\
             <input name=\"text\"><button>Add</button></form>",
            csrf_field(&ctx)
        );
        (page(&ctx, "Notes", &body), ctx)
    })
}

fn create_note() -> Action {
    action(|mut ctx: Context| async move {
        let text = ctx.param("text").unwrap_or_default().trim().to_string();
        if text.is_empty() {
            ctx.flash.set("error", "A note needs some text");
            return (Response::redirect("/notes"), ctx);
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        match ctx.transact(&[Op::assert(id.as_str(), "text", text)]) {
            Ok(()) => ctx.flash.set("notice", "Note saved"),
            Err(e) => ctx.flash.set("error", format!("Could not save note: {e}")),
        }
        (Response::redirect("/notes"), ctx)
    })
}

fn show_note() -> Action {
    action(|ctx: Context| async move {
        let id = ctx.param("id").unwrap_or_default();
        let text = ctx
            .snapshot()
            .and_then(|s| s.value(id, "text").and_then(Value::as_str).map(str::to_string));
        match text {
            Some(text) => {
                let body = format!("<p>{}</p>", escape(&text));
                (page(&ctx, "Note", &body), ctx)
            }
            None => (Response::not_found(), ctx),
        }
    })
}

fn upload_form() -> Action {
    action(|ctx: Context| async move {
        let body = format!(
            "<form method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">{}\
             <input name=\"title\"><input type=\"file\" name=\"file\" multiple>\
             <button>Upload</button></form>",
            csrf_field(&ctx)
        );
        (page(&ctx, "Upload", &body), ctx)
    })
}

fn upload() -> Action {
    action(|ctx: Context| async move {
        let mut items = String::new();
        if let Some(data) = &ctx.multipart {
            for part in data.files("file") {
                items.push_str(&format!(
                    "<li>{} ({}, {} bytes)</li>",
                    escape(part.filename.as_deref().unwrap_or_default()),
                    escape(part.content_type.as_deref().unwrap_or("application/octet-stream")),
                    part.content.len()
                ));
            }
        }
        let title = ctx.param("title").unwrap_or("untitled");
        let body = format!("<p>{}</p><ul>{items}</ul>", escape(title));
        (page(&ctx, "Uploaded", &body), ctx)
    })
}

fn login_form() -> Action {
    action(|ctx: Context| async move {
        let body = format!(
            "<form method=\"post\" action=\"/login\">{}\
             <input name=\"user\"><button>Log in</button></form>",
            csrf_field(&ctx)
        );
        (page(&ctx, "Log in", &body), ctx)
    })
}

fn login() -> Action {
    action(|mut ctx: Context| async move {
        let user = ctx.param("user").unwrap_or_default().trim().to_string();
        if user.is_empty() {
            ctx.flash.set("error", "Enter a user name");
            return (Response::redirect("/login"), ctx);
        }
        tracing::info!(parent: &ctx.services.span, user = %user, "User logged in");
        ctx.session.insert("user", user);
        ctx.flash.set("notice", "Welcome back");
        (Response::redirect("/account"), ctx)
    })
}

fn logout() -> Action {
    action(|mut ctx: Context| async move {
        ctx.session.clear();
        ctx.flash.set("notice", "Logged out");
        (Response::redirect("/"), ctx)
    })
}

fn account() -> Action {
    action(|ctx: Context| async move {
        let user = ctx.session.get("user").unwrap_or_default();
        let body = format!(
            "<p>Signed in as {}.</p><form method=\"post\" action=\"/logout\">{}\
             <button>Log out</button></form>",
            escape(user),
            csrf_field(&ctx)
        );
        (page(&ctx, "Account", &body), ctx)
    })
}
