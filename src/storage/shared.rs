//! Shared persistent-connection handle.
//!
//! # Responsibilities
//! - Hold the current persistent connection that every request starts from
//! - Hand it out for one request's read → process → write-back cycle
//! - Serialize those cycles so a write-back never overwrites a commit it
//!   did not see
//!
//! # Design Decisions
//! - Created once at startup and injected into the pipeline; never a global
//! - `ArcSwap` holds the current connection so reads are lock-free
//! - A `tokio::sync::Mutex` is held for the whole cycle by a [`Checkout`];
//!   dropping a checkout without committing abandons the request's changes
//! - [`Checkout::commit`] persists staged transactions and publishes under
//!   the lock, so the log and the published connection move together
//!
//! Without the checkout lock, two requests that read the same base and both
//! commit would race and the later write-back would discard the earlier
//! commit (lost update). The `tests` module reproduces that schedule.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::storage::persistent::{PersistentConnection, StoreError};

#[derive(Debug)]
struct SharedInner {
    current: ArcSwap<PersistentConnection>,
    writer: Arc<Mutex<()>>,
}

/// Injected handle to the connection shared by all requests.
#[derive(Debug, Clone)]
pub struct SharedConnection {
    inner: Arc<SharedInner>,
}

impl SharedConnection {
    pub fn new(conn: PersistentConnection) -> Self {
        Self {
            inner: Arc::new(SharedInner {
                current: ArcSwap::from_pointee(conn),
                writer: Arc::new(Mutex::new(())),
            }),
        }
    }

    /// The connection as last published. Does not wait for in-flight
    /// requests.
    pub fn current(&self) -> PersistentConnection {
        PersistentConnection::clone(&self.inner.current.load())
    }

    /// Begin a read → process → write-back cycle. Waits until no other
    /// checkout is outstanding.
    pub async fn checkout(&self) -> Checkout {
        let permit = Arc::clone(&self.inner.writer).lock_owned().await;
        Checkout {
            base: self.current(),
            shared: self.clone(),
            _permit: permit,
        }
    }

    /// Replace the current connection without holding the checkout lock.
    fn publish(&self, conn: PersistentConnection) {
        self.inner.current.store(Arc::new(conn));
    }
}

/// Exclusive access to the shared connection for one request.
#[derive(Debug)]
pub struct Checkout {
    base: PersistentConnection,
    shared: SharedConnection,
    _permit: OwnedMutexGuard<()>,
}

impl Checkout {
    /// The snapshot this request starts from.
    pub fn connection(&self) -> PersistentConnection {
        self.base.clone()
    }

    /// Persist the request's staged transactions, publish the resulting
    /// connection and release the lock. On a log error nothing is
    /// published.
    pub fn commit(self, conn: PersistentConnection) -> Result<(), StoreError> {
        let conn = conn.persist()?;
        tracing::debug!(from = self.base.basis(), to = conn.basis(), "Shared connection written back");
        self.shared.publish(conn);
        Ok(())
    }
}
