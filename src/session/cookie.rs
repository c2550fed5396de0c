//! Cookie header parsing and `Set-Cookie` rendering.
//!
//! Output format:
//! `name=value; Path=/; HttpOnly; SameSite=Lax[; Secure][; Max-Age=N][; Expires=...][; Domain=...]`

use std::fmt;

use crate::config::SessionConfig;

/// Split a `Cookie` request header into name/value pairs.
///
/// Pieces without `=` are skipped.
pub fn parse_cookie_header(header: &str) -> Vec<(&str, &str)> {
    header
        .split(';')
        .filter_map(|piece| {
            let (name, value) = piece.trim().split_once('=')?;
            Some((name.trim(), value.trim()))
        })
        .collect()
}

/// Find the first cookie called `name`.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    parse_cookie_header(header)
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v)
}

/// A `Set-Cookie` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    secure: bool,
    max_age: Option<u64>,
    expires: Option<String>,
    domain: Option<String>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secure: false,
            max_age: None,
            expires: None,
            domain: None,
        }
    }

    /// Session cookie carrying `value`, with attributes from configuration.
    pub fn for_session(config: &SessionConfig, value: impl Into<String>) -> Self {
        let mut cookie = Self::new(config.cookie_name.clone(), value).secure(config.secure);
        if let Some(max_age) = config.max_age_secs {
            cookie = cookie.max_age(max_age);
        }
        if let Some(domain) = &config.domain {
            cookie = cookie.domain(domain.clone());
        }
        cookie
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn max_age(mut self, secs: u64) -> Self {
        self.max_age = Some(secs);
        self
    }

    /// `Expires` attribute; `date` must already be an HTTP-date.
    pub fn expires(mut self, date: impl Into<String>) -> Self {
        self.expires = Some(date.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path=/; HttpOnly; SameSite=Lax", self.name, self.value)?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if let Some(expires) = &self.expires {
            write!(f, "; Expires={expires}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie_header() {
        let pairs = parse_cookie_header("a=1; session=abc.def ;broken; b = 2");
        assert_eq!(pairs, vec![("a", "1"), ("session", "abc.def"), ("b", "2")]);
        assert_eq!(find_cookie("a=1; session=x", "session"), Some("x"));
        assert_eq!(find_cookie("a=1", "session"), None);
    }

    #[test]
    fn test_minimal_set_cookie() {
        let cookie = SetCookie::new("session", "v.sig");
        assert_eq!(cookie.to_string(), "session=v.sig; Path=/; HttpOnly; SameSite=Lax");
    }

    #[test]
    fn test_full_set_cookie_attribute_order() {
        let cookie = SetCookie::new("s", "v")
            .secure(true)
            .max_age(3600)
            .expires("Wed, 21 Oct 2026 07:28:00 GMT")
            .domain("example.com");
        assert_eq!(
            cookie.to_string(),
            "s=v; Path=/; HttpOnly; SameSite=Lax; Secure; Max-Age=3600; \
             Expires=Wed, 21 Oct 2026 07:28:00 GMT; Domain=example.com"
        );
    }

    #[test]
    fn test_for_session_uses_config() {
        let config = SessionConfig {
            cookie_name: "sid".into(),
            secure: true,
            max_age_secs: Some(60),
            ..SessionConfig::default()
        };
        let cookie = SetCookie::for_session(&config, "x");
        assert_eq!(cookie.to_string(), "sid=x; Path=/; HttpOnly; SameSite=Lax; Secure; Max-Age=60");
    }
}
