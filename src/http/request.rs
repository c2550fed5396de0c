//! Transport-neutral request value.
//!
//! # Responsibilities
//! - Carry method, request target (path + query), headers and the buffered body
//! - Case-insensitive header lookup
//! - Split the target into path and query
//!
//! # Design Decisions
//! - The body is fully buffered before dispatch; nothing downstream touches
//!   the socket
//! - Cloning is cheap (`Bytes` body, `HeaderMap` of shared values)

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// An HTTP request as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a request from already-separated parts.
    pub fn from_parts(method: Method, target: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            target: target.into(),
            headers,
            body,
        }
    }

    /// Builder-style header append. Names or values that are not valid
    /// HTTP tokens are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path plus optional query string, as received.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// First value of a header, if it is valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Correlation id set by the `request_id` transport middleware.
    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query_split() {
        let req = Request::new(Method::GET, "/u/5?id=9&x=1");
        assert_eq!(req.path(), "/u/5");
        assert_eq!(req.query(), Some("id=9&x=1"));

        let bare = Request::new(Method::GET, "/u/5");
        assert_eq!(bare.path(), "/u/5");
        assert_eq!(bare.query(), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = Request::new(Method::POST, "/")
            .with_header("Content-Type", "text/plain")
            .with_header("bad header", "ignored");
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(req.headers().len(), 1);
    }
}
