//! Log-backed persistent connection.
//!
//! # Responsibilities
//! - Stage each transaction on the connection that produced it
//! - Append staged transactions to a JSON-lines log on [`PersistentConnection::persist`]
//! - Rebuild a connection by replaying the log on open
//!
//! # Design Decisions
//! - One line per transaction: `{"basis": N, "ops": [...]}`
//! - `transact` touches no file; the log only ever holds transactions that
//!   were written back, so it cannot run ahead of the published state
//! - `sync_data` after every persist; a transaction is committed only once
//!   it is on disk
//! - The log handle is shared between all connections derived from one
//!   `open`

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::storage::connection::{Connection, Op, Snapshot, TxError};

/// Errors from the transaction log itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode log entry: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("corrupt log entry at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("replay of log entry at line {line} failed: {source}")]
    Replay {
        line: usize,
        #[source]
        source: Box<TxError>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogEntry {
    basis: u64,
    ops: Vec<Op>,
}

#[derive(Debug)]
struct TxLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl TxLog {
    fn append(&self, entries: &[LogEntry]) -> Result<(), StoreError> {
        let mut lines = String::new();
        for entry in entries {
            lines.push_str(&serde_json::to_string(entry).map_err(StoreError::Encode)?);
            lines.push('\n');
        }

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(lines.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

/// A connection whose commits are durably appended to a log.
#[derive(Debug, Clone)]
pub struct PersistentConnection {
    conn: Connection,
    log: Arc<TxLog>,
    /// Transactions applied since the last persist, oldest first.
    staged: Arc<Vec<LogEntry>>,
}

impl PersistentConnection {
    /// Open (creating if missing) the log at `path` and replay it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut conn = Connection::new();
        for (index, line) in BufReader::new(&file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(&line).map_err(|source| StoreError::Corrupt {
                line: index + 1,
                source,
            })?;
            conn = conn.transact(&entry.ops).map_err(|source| StoreError::Replay {
                line: index + 1,
                source: Box::new(source),
            })?;
        }

        tracing::info!(path = %path.display(), basis = conn.basis(), "Transaction log replayed");

        Ok(Self {
            conn,
            log: Arc::new(TxLog {
                path: path.to_path_buf(),
                file: Mutex::new(file),
            }),
            staged: Arc::new(Vec::new()),
        })
    }

    /// Apply `ops` and return the new connection with the transaction
    /// staged. Nothing reaches the log until [`persist`](Self::persist).
    pub fn transact(&self, ops: &[Op]) -> Result<Self, TxError> {
        let next = self.conn.transact(ops)?;
        let mut staged = Vec::clone(&self.staged);
        staged.push(LogEntry {
            basis: next.basis(),
            ops: ops.to_vec(),
        });
        Ok(Self {
            conn: next,
            log: Arc::clone(&self.log),
            staged: Arc::new(staged),
        })
    }

    /// Append every staged transaction to the log and fsync. Returns the
    /// same state with nothing staged.
    pub fn persist(&self) -> Result<Self, StoreError> {
        if !self.staged.is_empty() {
            self.log.append(&self.staged)?;
            tracing::debug!(
                path = %self.log.path.display(),
                transactions = self.staged.len(),
                basis = self.conn.basis(),
                "Transactions appended to log"
            );
        }
        Ok(Self {
            conn: self.conn.clone(),
            log: Arc::clone(&self.log),
            staged: Arc::new(Vec::new()),
        })
    }

    /// Number of transactions not yet persisted.
    pub fn staged(&self) -> usize {
        self.staged.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.conn.snapshot()
    }

    pub fn basis(&self) -> u64 {
        self.conn.basis()
    }

    pub fn log_path(&self) -> &Path {
        &self.log.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commits_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");

        let conn = PersistentConnection::open(&path).unwrap();
        let conn = conn.transact(&[Op::assert("note-1", "text", "a")]).unwrap();
        let conn = conn.persist().unwrap();
        let conn = conn.transact(&[Op::assert("note-2", "text", "b")]).unwrap();
        let conn = conn.transact(&[Op::retract("note-1", "text")]).unwrap();
        assert_eq!(conn.staged(), 2);
        assert_eq!(conn.persist().unwrap().staged(), 0);

        let reopened = PersistentConnection::open(&path).unwrap();
        let snapshot = reopened.snapshot();
        assert_eq!(reopened.basis(), 3);
        assert_eq!(snapshot.value("note-1", "text"), None);
        assert_eq!(snapshot.value("note-2", "text"), Some(&json!("b")));
    }

    #[test]
    fn test_unpersisted_transactions_never_reach_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");

        let conn = PersistentConnection::open(&path).unwrap();
        let conn = conn.transact(&[Op::assert("a", "text", "x")]).unwrap().persist().unwrap();
        // Retracted on a connection that is then dropped.
        let _abandoned = conn.transact(&[Op::retract("a", "text")]).unwrap();
        // The same retract again from the persisted state.
        conn.transact(&[Op::retract("a", "text")]).unwrap().persist().unwrap();

        let reopened = PersistentConnection::open(&path).unwrap();
        assert_eq!(reopened.basis(), 2);
        assert_eq!(reopened.snapshot().value("a", "text"), None);
    }

    #[test]
    fn test_failed_transaction_is_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");

        let conn = PersistentConnection::open(&path).unwrap();
        assert!(conn.transact(&[Op::retract("missing", "x")]).is_err());
        conn.persist().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/tx.log");
        let conn = PersistentConnection::open(&path).unwrap();
        assert_eq!(conn.log_path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_log_is_reported_with_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");
        std::fs::write(
            &path,
            "{\"basis\":1,\"ops\":[{\"op\":\"assert\",\"entity\":\"a\",\"attribute\":\"b\",\"value\":1}]}\nnot json\n",
        )
        .unwrap();

        let err = PersistentConnection::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 2, .. }));
    }
}
