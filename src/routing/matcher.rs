//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse `/`-delimited patterns where `:name` segments bind variables
//! - Match a request path, producing variable bindings
//! - Rank patterns by specificity
//!
//! # Design Decisions
//! - Literal segments match byte-for-byte (case-sensitive, no decoding)
//! - Segment counts must be equal; there are no wildcards
//! - Bound values are the raw path segments
//! - No regex, so matching is O(segments)

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// Specificity of a pattern. Greater is more specific.
///
/// Ordering: more literal segments first, then fewer variable segments.
/// Patterns equal on both keys are left in registration order by the
/// router. Among patterns that match the same path both keys move
/// together, so e.g. `/a/:x/c` and `/a/b/:y` always tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specificity {
    pub literals: usize,
    pub variables: usize,
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.literals
            .cmp(&other.literals)
            .then_with(|| other.variables.cmp(&self.variables))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Variable(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Variable bindings if `path` matches, in pattern order.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut bindings = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Variable(name) => bindings.push((name.clone(), part.to_string())),
            }
        }
        Some(bindings)
    }

    pub fn specificity(&self) -> Specificity {
        let variables = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Variable(_)))
            .count();
        Specificity {
            literals: self.segments.len() - variables,
            variables,
        }
    }

    /// Fill variables from `params`; `None` if any variable is missing.
    pub fn render(&self, params: &[(&str, &str)]) -> Option<String> {
        let mut rendered = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => rendered.push(literal.clone()),
                Segment::Variable(name) => {
                    let (_, value) = params.iter().find(|(k, _)| *k == name.as_str())?;
                    rendered.push((*value).to_string());
                }
            }
        }
        Some(rendered.join("/"))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
