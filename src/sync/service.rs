//! Runs syncs for stored bank connections.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::{
    Error,
    bank_connection::{
        flag_needs_reauth, get_bank_connection_by_item_id, get_syncable_bank_connections,
        reset_cursor,
    },
    config::SyncConfig,
    plaid::PlaidErrorKind,
    sync::{TransactionSyncApi, commit_sync, fetch_transactions},
};

/// What a successful sync changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// The item that was synced.
    pub item_id: String,
    /// The number of new transactions.
    pub added: usize,
    /// The number of changed transactions.
    pub modified: usize,
    /// The number of removed transactions.
    pub removed: usize,
    /// The number of accounts reported by Plaid.
    pub accounts: usize,
    /// The number of pages fetched.
    pub pages: usize,
    /// The cursor the next sync resumes from.
    pub cursor: String,
}

fn lock_connection(db_connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

/// Fetch every change since the stored cursor of `item_id` and commit it.
///
/// The database lock is only held while reading the connection and while
/// committing, never while waiting on Plaid.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if there is no connection for `item_id`,
/// - [Error::InactiveConnection] if the connection was unlinked,
/// - [Error::ReauthRequired] if Plaid rejected the access token, the
///   connection is flagged so the poll job skips it,
/// - [Error::Plaid] if fetching failed for another reason,
/// - [Error::CursorConflict] if another sync for the item committed first,
/// - or an error from writing the batch.
///
/// On any error the stored transactions and cursor are unchanged.
pub async fn sync_item<A>(
    api: &A,
    db_connection: &Mutex<Connection>,
    item_id: &str,
    config: &SyncConfig,
) -> Result<SyncSummary, Error>
where
    A: TransactionSyncApi,
{
    let bank_connection = {
        let connection = lock_connection(db_connection)?;
        get_bank_connection_by_item_id(item_id, &connection)?
    };

    if !bank_connection.active {
        return Err(Error::InactiveConnection(item_id.to_owned()));
    }

    tracing::info!(item_id, cursor = ?bank_connection.cursor, "Starting sync");

    let fetched = match fetch_transactions(
        api,
        &bank_connection.access_token,
        bank_connection.cursor.as_deref(),
        config,
    )
    .await
    {
        Ok(fetched) => fetched,
        Err(error) if error.error.kind() == PlaidErrorKind::ReauthRequired => {
            tracing::warn!(item_id, error = %error.error, "Item needs re-authentication");
            let connection = lock_connection(db_connection)?;
            flag_needs_reauth(item_id, &connection)?;
            return Err(Error::ReauthRequired(item_id.to_owned()));
        }
        Err(error) => {
            tracing::error!(item_id, "Sync failed: {error}");
            return Err(error.into());
        }
    };

    let applied = {
        let connection = lock_connection(db_connection)?;
        commit_sync(&bank_connection, &fetched, &connection)
    }
    .inspect_err(|error| tracing::error!(item_id, "Could not commit sync: {error}"))?;

    let (added, modified, removed) = fetched.batch.counts();
    tracing::info!(
        item_id,
        added,
        modified,
        removed,
        pages = fetched.pages,
        accounts = applied.accounts,
        "Sync committed"
    );

    Ok(SyncSummary {
        item_id: item_id.to_owned(),
        added,
        modified,
        removed,
        accounts: applied.accounts,
        pages: fetched.pages,
        cursor: fetched.cursor,
    })
}

/// Clear the stored cursor of `item_id` and sync its full history again.
///
/// # Errors
/// Returns the same errors as [sync_item]. If the sync fails the cursor stays
/// cleared and the next sync starts from the beginning.
pub async fn resync_item<A>(
    api: &A,
    db_connection: &Mutex<Connection>,
    item_id: &str,
    config: &SyncConfig,
) -> Result<SyncSummary, Error>
where
    A: TransactionSyncApi,
{
    {
        let connection = lock_connection(db_connection)?;
        let bank_connection = get_bank_connection_by_item_id(item_id, &connection)?;
        if !bank_connection.active {
            return Err(Error::InactiveConnection(item_id.to_owned()));
        }
        reset_cursor(item_id, &connection)?;
    }

    tracing::info!(item_id, "Cursor reset for full resync");

    sync_item(api, db_connection, item_id, config).await
}

/// Sync every active connection that does not need re-authentication, each in
/// its own task.
///
/// A failing connection does not stop the others. Returns the result for each
/// item in the order the tasks finished.
///
/// # Errors
/// Returns an error only if the connections could not be listed.
pub async fn sync_all_connections<A>(
    api: Arc<A>,
    db_connection: Arc<Mutex<Connection>>,
    config: Arc<SyncConfig>,
) -> Result<Vec<(String, Result<SyncSummary, Error>)>, Error>
where
    A: TransactionSyncApi,
{
    let item_ids: Vec<String> = {
        let connection = lock_connection(&db_connection)?;
        get_syncable_bank_connections(&connection)?
            .into_iter()
            .map(|bank_connection| bank_connection.item_id)
            .collect()
    };

    tracing::info!(connections = item_ids.len(), "Syncing all connections");

    let mut tasks = JoinSet::new();

    for item_id in item_ids {
        let api = api.clone();
        let db_connection = db_connection.clone();
        let config = config.clone();

        tasks.spawn(async move {
            let result = sync_item(api.as_ref(), &db_connection, &item_id, &config).await;
            (item_id, result)
        });
    }

    let mut results = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(error) => tracing::error!("Sync task failed to complete: {error}"),
        }
    }

    Ok(results)
}
