//! Static file fallback for unmatched requests.

use std::path::{Component, Path, PathBuf};

use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use percent_encoding::percent_decode_str;

use crate::http::Response;

/// Looks up a response for a path no route matched.
pub trait StaticFiles: Send + Sync {
    fn lookup<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Option<Response>>;
}

/// Serves files below a root directory.
#[derive(Debug, Clone)]
pub struct StaticDir {
    root: PathBuf,
}

impl StaticDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a request path, or `None` if it would leave the
    /// root.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(path).decode_utf8().ok()?;
        let mut relative = PathBuf::new();
        for component in Path::new(decoded.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if decoded.ends_with('/') || relative.as_os_str().is_empty() {
            relative.push("index.html");
        }
        Some(self.root.join(relative))
    }
}

impl StaticFiles for StaticDir {
    fn lookup<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Option<Response>> {
        async move {
            let Some(file) = self.resolve(path) else {
                tracing::debug!(path, "Rejected static path");
                return None;
            };
            let metadata = tokio::fs::metadata(&file).await.ok()?;
            if !metadata.is_file() {
                return None;
            }
            match tokio::fs::read(&file).await {
                Ok(content) => {
                    let mime = mime_guess::from_path(&file).first_or_octet_stream();
                    let response = Response::ok(content);
                    Some(match HeaderValue::from_str(mime.as_ref()) {
                        Ok(value) => response.with_header(CONTENT_TYPE, value),
                        Err(_) => response,
                    })
                }
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "Failed to read static file");
                    None
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_with_files() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_serves_file_with_content_type() {
        let dir = dir_with_files();
        let files = StaticDir::new(dir.path());

        let response = files.lookup("/css/site.css").await.unwrap();
        assert_eq!(response.body().as_ref(), b"body{}");
        assert_eq!(response.header("content-type"), Some("text/css"));
    }

    #[tokio::test]
    async fn test_unknown_extension_is_octet_stream() {
        let dir = dir_with_files();
        std::fs::write(dir.path().join("blob.zzq"), [0u8, 1, 2]).unwrap();
        let files = StaticDir::new(dir.path());

        let response = files.lookup("/blob.zzq").await.unwrap();
        assert_eq!(response.header("content-type"), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn test_directory_serves_index() {
        let dir = dir_with_files();
        let files = StaticDir::new(dir.path());
        let response = files.lookup("/").await.unwrap();
        assert_eq!(response.body().as_ref(), b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_missing_and_escaping_paths() {
        let dir = dir_with_files();
        let files = StaticDir::new(dir.path().join("css"));

        assert!(files.lookup("/nope.css").await.is_none());
        assert!(files.lookup("/../index.html").await.is_none());
        assert!(files.lookup("/%2e%2e/index.html").await.is_none());
        assert!(files.lookup("/").await.is_none());
    }
}
