//! Incremental transaction sync: page through Plaid's change feed, then write
//! the accumulated changes and the new cursor in one transaction.

mod api;
mod batch;
mod fetch;
mod reconcile;
mod service;

pub use api::{SyncPage, SyncPageRequest, TransactionSyncApi};
pub use batch::SyncBatch;
pub use fetch::{FetchError, FetchedTransactions, fetch_transactions};
pub use reconcile::{AppliedBatch, apply_batch, commit_sync};
pub use service::{SyncSummary, resync_item, sync_all_connections, sync_item};
