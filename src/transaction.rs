//! Defines the transaction models and the database queries that reconcile
//! synced transactions into the store.

use rusqlite::{Connection, Row, params_from_iter};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{AccountId, BankConnectionId, TransactionId},
};

/// The maximum number of external IDs bound to a single `DELETE` statement.
const DELETE_CHUNK_SIZE: usize = 500;

// ============================================================================
// MODELS
// ============================================================================

/// A transaction stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Plaid's `transaction_id`. Unique across the whole database.
    pub external_id: String,
    /// The account the transaction belongs to.
    pub account_id: AccountId,
    /// The merchant or description of the transaction.
    pub name: String,
    /// The amount of the transaction, positive when money leaves the account.
    pub amount: f64,
    /// The ISO currency code of the amount.
    pub currency: Option<String>,
    /// How the transaction was made, e.g. "online", "in store" or "other".
    pub payment_channel: String,
    /// The broad category, e.g. "FOOD_AND_DRINK".
    pub category: Option<String>,
    /// The detailed category, e.g. "FOOD_AND_DRINK_COFFEE".
    pub subcategory: Option<String>,
    /// The date the transaction posted.
    pub date: Date,
    /// The date the transaction was authorized, if known.
    pub authorized_date: Option<Date>,
    /// Whether the transaction has not settled yet.
    pub pending: bool,
    /// Cleared when the bank connection is unlinked.
    pub active: bool,
    /// When the row was first inserted.
    pub created_at: OffsetDateTime,
}

/// A transaction as reported by Plaid in the `added` or `modified` lists of a
/// sync response.
///
/// Added and modified transactions are both written with
/// [upsert_transactions], keyed on `external_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedTransaction {
    /// Plaid's `transaction_id`.
    pub external_id: String,
    /// Plaid's `account_id` for the account the transaction belongs to.
    pub account_external_id: String,
    /// The merchant or description of the transaction.
    pub name: String,
    /// The amount of the transaction, positive when money leaves the account.
    pub amount: f64,
    /// The ISO currency code of the amount.
    pub currency: Option<String>,
    /// How the transaction was made.
    pub payment_channel: String,
    /// The broad category.
    pub category: Option<String>,
    /// The detailed category.
    pub subcategory: Option<String>,
    /// The date the transaction posted.
    pub date: Date,
    /// The date the transaction was authorized.
    pub authorized_date: Option<Date>,
    /// Whether the transaction has not settled yet.
    pub pending: bool,
}

impl SyncedTransaction {
    /// Create a settled transaction paid through "other" channels with no category.
    pub fn new(
        external_id: &str,
        account_external_id: &str,
        name: &str,
        amount: f64,
        date: Date,
    ) -> Self {
        Self {
            external_id: external_id.to_owned(),
            account_external_id: account_external_id.to_owned(),
            name: name.to_owned(),
            amount,
            currency: None,
            payment_channel: "other".to_owned(),
            category: None,
            subcategory: None,
            date,
            authorized_date: None,
            pending: false,
        }
    }

    /// Set the currency code.
    pub fn currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_owned());
        self
    }

    /// Set the category and subcategory.
    pub fn category(mut self, category: &str, subcategory: &str) -> Self {
        self.category = Some(category.to_owned());
        self.subcategory = Some(subcategory.to_owned());
        self
    }

    /// Set the payment channel.
    pub fn payment_channel(mut self, payment_channel: &str) -> Self {
        self.payment_channel = payment_channel.to_owned();
        self
    }

    /// Set whether the transaction is pending.
    pub fn pending(mut self, pending: bool) -> Self {
        self.pending = pending;
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT NOT NULL UNIQUE,
                account_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT,
                payment_channel TEXT NOT NULL,
                category TEXT,
                subcategory TEXT,
                date TEXT NOT NULL,
                authorized_date TEXT,
                pending INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_account_date ON \"transaction\"(account_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        external_id: row.get(1)?,
        account_id: row.get(2)?,
        name: row.get(3)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        payment_channel: row.get(6)?,
        category: row.get(7)?,
        subcategory: row.get(8)?,
        date: row.get(9)?,
        authorized_date: row.get(10)?,
        pending: row.get(11)?,
        active: row.get(12)?,
        created_at: row.get(13)?,
    })
}

const SELECT_TRANSACTION: &str = "SELECT id, external_id, account_id, name, amount, currency, \
    payment_channel, category, subcategory, date, authorized_date, pending, active, created_at \
    FROM \"transaction\"";

/// Insert transactions, or update the existing rows with the same external ID.
///
/// On conflict only the name, amount, currency, payment channel, category and
/// subcategory are updated. The row ID, account, dates, pending flag and
/// creation time of an existing row are left as they are.
///
/// Returns the number of rows that were inserted or updated.
///
/// **Note**: If you want transactional integrity (all or nothing), pass in a
/// transaction for `connection`.
///
/// # Errors
/// This function will return a:
/// - [Error::UnknownAccount] if a transaction's account is not in the database,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn upsert_transactions<'a>(
    transactions: impl IntoIterator<Item = &'a SyncedTransaction>,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<usize, Error> {
    let mut stmt = connection.prepare(
        "INSERT INTO \"transaction\" (
            external_id, account_id, name, amount, currency, payment_channel,
            category, subcategory, date, authorized_date, pending, created_at
         )
         VALUES (?1, (SELECT id FROM account WHERE external_id = ?2), ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(external_id) DO UPDATE SET
             name = excluded.name,
             amount = excluded.amount,
             currency = excluded.currency,
             payment_channel = excluded.payment_channel,
             category = excluded.category,
             subcategory = excluded.subcategory",
    )?;

    let mut upserted_rows = 0;

    for transaction in transactions {
        let rows = stmt
            .execute((
                &transaction.external_id,
                &transaction.account_external_id,
                &transaction.name,
                transaction.amount,
                &transaction.currency,
                &transaction.payment_channel,
                &transaction.category,
                &transaction.subcategory,
                transaction.date,
                transaction.authorized_date,
                transaction.pending,
                created_at,
            ))
            .map_err(|error| match error {
                // The account lookup returns NULL when the account is missing.
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: _,
                        extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL,
                    },
                    _,
                ) => Error::UnknownAccount(transaction.account_external_id.clone()),
                error => error.into(),
            })?;

        upserted_rows += rows;
    }

    Ok(upserted_rows)
}

/// Delete the transactions with the given external IDs.
///
/// External IDs that are not in the database are ignored. An empty slice does
/// not touch the database.
///
/// Returns the number of rows that were deleted.
pub fn delete_transactions(external_ids: &[String], connection: &Connection) -> Result<usize, Error> {
    if external_ids.is_empty() {
        return Ok(0);
    }

    let mut deleted_rows = 0;

    for chunk in external_ids.chunks(DELETE_CHUNK_SIZE) {
        let placeholders = std::iter::repeat_n("?", chunk.len())
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!("DELETE FROM \"transaction\" WHERE external_id IN ({placeholders})");

        deleted_rows += connection.execute(&query, params_from_iter(chunk.iter()))?;
    }

    Ok(deleted_rows)
}

/// Retrieve a transaction from the database by its external ID.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `external_id` does not refer to a stored transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction_by_external_id(
    external_id: &str,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!("{SELECT_TRANSACTION} WHERE external_id = ?1"))?
        .query_row([external_id], map_transaction_row)
        .map_err(Error::from)
}

/// Get the transactions for all accounts of a bank connection, newest first.
pub fn get_transactions_for_connection(
    bank_connection_id: BankConnectionId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_TRANSACTION}
             WHERE account_id IN (SELECT id FROM account WHERE bank_connection_id = ?1)
             ORDER BY date DESC, id DESC"
        ))?
        .query_map([bank_connection_id], map_transaction_row)?
        .map(|result| result.map_err(Error::from))
        .collect()
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Soft delete the transactions of every account of a bank connection.
pub fn deactivate_transactions_for_connection(
    bank_connection_id: BankConnectionId,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "UPDATE \"transaction\" SET active = 0
             WHERE active = 1
             AND account_id IN (SELECT id FROM account WHERE bank_connection_id = ?1)",
            [bank_connection_id],
        )
        .map_err(Error::from)
}

// ============================================================================
// TESTS
// ============================================================================
