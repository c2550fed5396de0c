//! In-memory fact store connection.
//!
//! # Responsibilities
//! - Hold an immutable set of (entity, attribute) → value facts
//! - Apply a transaction atomically, producing a new connection
//! - Expose read-only snapshots
//!
//! # Design Decisions
//! - Connections are values: `transact` never mutates `self`
//! - Facts are cardinality-one; asserting an existing key replaces its value
//! - Snapshots share the fact map via `Arc`, so taking one is O(1)

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single transaction operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Assert {
        entity: String,
        attribute: String,
        value: Value,
    },
    Retract {
        entity: String,
        attribute: String,
    },
}

impl Op {
    pub fn assert(entity: impl Into<String>, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Op::Assert {
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn retract(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Op::Retract {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }
}

/// A stored fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub entity: String,
    pub attribute: String,
    pub value: Value,
}

/// Errors returned to the action that attempted a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    #[error("transaction contains no operations")]
    Empty,
    #[error("operation {index} has an empty {field}")]
    EmptyIdentifier { index: usize, field: &'static str },
    #[error("cannot retract {entity}/{attribute}: no such fact")]
    MissingFact { entity: String, attribute: String },
    #[error("no database is configured for this request")]
    NoDatabase,
}

type FactMap = BTreeMap<(String, String), Value>;

/// Read-only view of a connection at one basis.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    facts: Arc<FactMap>,
    basis: u64,
}

impl Snapshot {
    /// Number of transactions applied to reach this snapshot.
    pub fn basis(&self) -> u64 {
        self.basis
    }

    pub fn value(&self, entity: &str, attribute: &str) -> Option<&Value> {
        self.facts.get(&(entity.to_string(), attribute.to_string()))
    }

    /// All facts, ordered by entity then attribute.
    pub fn facts(&self) -> impl Iterator<Item = Fact> + '_ {
        self.facts.iter().map(|((entity, attribute), value)| Fact {
            entity: entity.clone(),
            attribute: attribute.clone(),
            value: value.clone(),
        })
    }

    /// Entities that have a value for `attribute`.
    pub fn entities_with(&self, attribute: &str) -> Vec<&str> {
        self.facts
            .keys()
            .filter(|(_, a)| a == attribute)
            .map(|(e, _)| e.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// An in-memory connection.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    snapshot: Snapshot,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    pub fn basis(&self) -> u64 {
        self.snapshot.basis
    }

    /// Apply `ops` atomically. On error nothing is applied.
    pub fn transact(&self, ops: &[Op]) -> Result<Connection, TxError> {
        if ops.is_empty() {
            return Err(TxError::Empty);
        }

        let mut facts: FactMap = (*self.snapshot.facts).clone();
        for (index, op) in ops.iter().enumerate() {
            match op {
                Op::Assert {
                    entity,
                    attribute,
                    value,
                } => {
                    check_identifiers(index, entity, attribute)?;
                    facts.insert((entity.clone(), attribute.clone()), value.clone());
                }
                Op::Retract { entity, attribute } => {
                    check_identifiers(index, entity, attribute)?;
                    if facts.remove(&(entity.clone(), attribute.clone())).is_none() {
                        return Err(TxError::MissingFact {
                            entity: entity.clone(),
                            attribute: attribute.clone(),
                        });
                    }
                }
            }
        }

        Ok(Connection {
            snapshot: Snapshot {
                facts: Arc::new(facts),
                basis: self.snapshot.basis + 1,
            },
        })
    }
}

fn check_identifiers(index: usize, entity: &str, attribute: &str) -> Result<(), TxError> {
    if entity.is_empty() {
        return Err(TxError::EmptyIdentifier { index, field: "entity" });
    }
    if attribute.is_empty() {
        return Err(TxError::EmptyIdentifier { index, field: "attribute" });
    }
    Ok(())
}
