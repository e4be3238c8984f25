//! The seam between the sync loop and the paging API it reads from.

use std::future::Future;

use serde::Serialize;

use crate::{
    account::SyncedAccount,
    plaid::{AccessToken, PlaidError},
    transaction::SyncedTransaction,
};

/// A request for one page of changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPageRequest {
    /// The access token of the item to read.
    pub access_token: AccessToken,
    /// The cursor returned by the previous page, `None` to start from the
    /// beginning of the item's history.
    pub cursor: Option<String>,
    /// The maximum number of transactions in the page.
    pub count: u32,
}

/// One page of changes since the request cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncPage {
    /// Transactions that are new since the cursor.
    pub added: Vec<SyncedTransaction>,
    /// Transactions that changed since the cursor.
    pub modified: Vec<SyncedTransaction>,
    /// The external IDs of transactions removed since the cursor.
    pub removed: Vec<String>,
    /// The accounts of the item with their latest balances.
    pub accounts: Vec<SyncedAccount>,
    /// The cursor to request the next page with.
    pub next_cursor: String,
    /// Whether there are more pages after this one.
    pub has_more: bool,
}

/// Reads pages of transaction changes for an item.
///
/// Implemented by [crate::plaid::PlaidClient]. Tests use scripted fakes.
pub trait TransactionSyncApi: Send + Sync + 'static {
    /// Fetch the page of changes after `request.cursor`.
    fn sync_transactions(
        &self,
        request: SyncPageRequest,
    ) -> impl Future<Output = Result<SyncPage, PlaidError>> + Send;
}
