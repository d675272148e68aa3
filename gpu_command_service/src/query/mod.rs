//! Queries and asynchronous completion
//!
//! Every result handed back to the client, whatever its category, goes
//! through a [`QuerySync`] record: result first, release barrier, then the
//! submit count.

pub mod query_sync;
pub mod query_manager;
pub mod async_transfer;

pub use query_sync::{CompletionObserver, QuerySync, QUERY_SYNC_SIZE};
pub use query_manager::{Query, QueryError, QueryKey, QueryKind, QueryManager, QueryState};
pub use async_transfer::{AsyncTransferManager, StagedTransfer, TransferParams};
