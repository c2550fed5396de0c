//! One-request flash messages carried in the session.

use crate::session::Session;

/// Session key prefix reserved for flash entries.
pub const FLASH_PREFIX: &str = "_flash.";

/// Flash messages for the current request and the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flash {
    current: Vec<(String, String)>,
    next: Vec<(String, String)>,
}

impl Flash {
    /// Move every reserved-prefix entry out of `session` into `current`.
    pub fn extract(session: &mut Session) -> Self {
        Self {
            current: session.drain_prefixed(FLASH_PREFIX),
            next: Vec::new(),
        }
    }

    /// Read a message delivered by the previous request.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.current
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn current(&self) -> impl Iterator<Item = (&str, &str)> {
        self.current.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Queue a message for the next request.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.next.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.next.push((key, value)),
        }
    }

    /// Queued messages, in insertion order.
    pub fn next(&self) -> impl Iterator<Item = (&str, &str)> {
        self.next.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Carry the current messages over one more request. Keys already
    /// queued with [`Flash::set`] are left alone.
    pub fn keep(&mut self) {
        for (key, value) in &self.current {
            if !self.next.iter().any(|(k, _)| k == key) {
                self.next.push((key.clone(), value.clone()));
            }
        }
    }

    /// Write queued messages into `session` under the reserved prefix.
    pub fn merge_into(self, session: &mut Session) {
        for (key, value) in self.next {
            session.insert(format!("{FLASH_PREFIX}{key}"), value);
        }
    }
}
