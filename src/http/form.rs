//! URL-encoded query/form parsing and the merged parameter list.

use std::str::FromStr;

use url::form_urlencoded;

/// Parse `application/x-www-form-urlencoded` bytes (or a query string).
pub fn parse_urlencoded(input: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Ordered request parameters. Lookup is first-match-wins, so whatever was
/// inserted earlier shadows later entries with the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters from a query string (without the leading `?`).
    pub fn from_query(query: Option<&str>) -> Self {
        Self(query.map(|q| parse_urlencoded(q.as_bytes())).unwrap_or_default())
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Parse the first value for `name`, falling back to `default` when it
    /// is missing or does not parse.
    pub fn parse_or<T: FromStr>(&self, name: &str, default: T) -> T {
        self.get(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Append entries; they lose to anything already present.
    pub fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.0.extend(entries);
    }

    /// Insert entries at the front; they win over anything already present.
    pub fn prepend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged: Vec<_> = entries.into_iter().collect();
        merged.append(&mut self.0);
        self.0 = merged;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
