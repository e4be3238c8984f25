//! Writes a fetched batch to the database and advances the cursor.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use time::OffsetDateTime;

use crate::{
    Error,
    account::upsert_account,
    bank_connection::{BankConnection, advance_cursor},
    database_id::BankConnectionId,
    sync::{FetchedTransactions, SyncBatch},
    transaction::{delete_transactions, upsert_transactions},
};

/// The number of rows a batch touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedBatch {
    /// Accounts inserted or updated.
    pub accounts: usize,
    /// Transactions inserted or updated.
    pub upserted: usize,
    /// Transactions deleted.
    pub deleted: usize,
}

/// Upsert the accounts and transactions of `batch` and delete its removed
/// transactions.
///
/// Accounts are written first so that new transactions can reference them.
/// Applying the same batch twice leaves the database as applying it once.
///
/// **Note**: If you want transactional integrity (all or nothing), pass in a
/// transaction for `connection`.
///
/// # Errors
/// This function will return a:
/// - [Error::UnknownAccount] if a transaction references an account that is
///   neither stored nor in the batch,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn apply_batch(
    bank_connection_id: BankConnectionId,
    batch: &SyncBatch,
    connection: &Connection,
) -> Result<AppliedBatch, Error> {
    let mut accounts = 0;
    for account in batch.accounts() {
        upsert_account(bank_connection_id, account, connection)?;
        accounts += 1;
    }

    let upserted = upsert_transactions(batch.upserts(), OffsetDateTime::now_utc(), connection)?;
    let deleted = delete_transactions(&batch.removed(), connection)?;

    Ok(AppliedBatch {
        accounts,
        upserted,
        deleted,
    })
}

/// Apply a fetched batch and move the connection's cursor forward in one
/// exclusive transaction.
///
/// The cursor only moves if it still equals the cursor in `bank_connection`,
/// the snapshot the fetch started from. On any error nothing is written.
///
/// # Errors
/// This function will return a:
/// - [Error::CursorConflict] if another sync advanced the cursor first,
/// - [Error::UnknownAccount] if a transaction references a missing account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn commit_sync(
    bank_connection: &BankConnection,
    fetched: &FetchedTransactions,
    connection: &Connection,
) -> Result<AppliedBatch, Error> {
    let tx = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    let applied = apply_batch(bank_connection.id, &fetched.batch, &tx)?;
    advance_cursor(
        &bank_connection.item_id,
        bank_connection.cursor.as_deref(),
        &fetched.cursor,
        OffsetDateTime::now_utc(),
        &tx,
    )?;

    tx.commit()?;

    Ok(applied)
}
