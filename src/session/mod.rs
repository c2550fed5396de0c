//! Cookie-backed session subsystem.
//!
//! # Data Flow
//! ```text
//! Cookie header
//!     → cookie.rs (find the session cookie)
//!     → codec.rs (verify signature, decode entries)
//!     → flash.rs (strip reserved keys into Flash.current)
//!     → handlers mutate Session / Flash.next
//!     → flash.rs (merge Flash.next back)
//!     → codec.rs (encode + sign)
//!     → cookie.rs (Set-Cookie header)
//! ```
//!
//! # Design Decisions
//! - Sessions live entirely in the cookie; there is no server-side store
//! - A cookie that fails verification yields an empty session, never an error
//! - Entry order is preserved so encoding is deterministic

pub mod codec;
pub mod cookie;
pub mod flash;

pub use codec::{decode, encode};
pub use cookie::SetCookie;
pub use flash::{Flash, FLASH_PREFIX};

/// Ordered set of unique string key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    entries: Vec<(String, String)>,
    modified: bool,
}

impl Session {
    /// Create an empty, unmodified session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an unmodified session from decoded entries.
    ///
    /// A repeated key keeps its first position and its last value.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut session = Self::new();
        for (key, value) in entries {
            session.insert(key, value);
        }
        session.modified = false;
        session
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or replace a value. Replacement keeps the key's position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => {
                if entry.1 != value {
                    entry.1 = value;
                    self.modified = true;
                }
            }
            None => {
                self.entries.push((key, value));
                self.modified = true;
            }
        }
    }

    /// Remove a key, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        self.modified = true;
        Some(self.entries.remove(index).1)
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.modified = true;
        }
    }

    /// Remove every entry whose key starts with `prefix`, returning them
    /// with the prefix stripped.
    pub(crate) fn drain_prefixed(&mut self, prefix: &str) -> Vec<(String, String)> {
        let mut drained = Vec::new();
        self.entries.retain(|(k, v)| match k.strip_prefix(prefix) {
            Some(rest) => {
                drained.push((rest.to_string(), v.clone()));
                false
            }
            None => true,
        });
        if !drained.is_empty() {
            self.modified = true;
        }
        drained
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once any mutation has changed the entries.
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut session = Session::from_entries([("a", "1"), ("b", "2")]);
        assert!(!session.is_modified());

        session.insert("a", "3");
        assert!(session.is_modified());
        assert_eq!(
            session.entries(),
            &[("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn test_same_value_insert_is_not_a_modification() {
        let mut session = Session::from_entries([("a", "1")]);
        session.insert("a", "1");
        assert!(!session.is_modified());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut session = Session::from_entries([("a", "1"), ("b", "2")]);
        assert_eq!(session.remove("a").as_deref(), Some("1"));
        assert_eq!(session.remove("missing"), None);
        assert_eq!(session.len(), 1);

        session.clear();
        assert!(session.is_empty());
        assert!(session.is_modified());
    }

    #[test]
    fn test_drain_prefixed() {
        let mut session = Session::from_entries([("_flash.n", "hi"), ("user", "bob")]);
        let drained = session.drain_prefixed("_flash.");
        assert_eq!(drained, vec![("n".to_string(), "hi".to_string())]);
        assert_eq!(session.get("user"), Some("bob"));
        assert!(!session.contains_key("_flash.n"));
    }
}
