//! Storage boundary.
//!
//! # Data Flow
//! ```text
//! Request start (pipeline step 5):
//!     shared handle configured → shared.rs checkout (current snapshot)
//!     otherwise                → fresh Connection / PersistentConnection::open
//!
//! Action:
//!     ctx.transact(ops) → connection.rs (validate + apply) → persistent.rs (stage)
//!
//! Request end (pipeline step 11):
//!     checkout.commit(ctx connection) → persist (append log) → publish
//! ```
//!
//! # Design Decisions
//! - The query engine is out of scope; `Snapshot` offers direct lookups only
//! - Transaction failures are typed (`TxError`) and returned to the action

pub mod connection;
pub mod persistent;
pub mod shared;

pub use connection::{Connection, Fact, Op, Snapshot, TxError};
pub use persistent::{PersistentConnection, StoreError};
pub use shared::{Checkout, SharedConnection};
