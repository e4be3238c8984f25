//! Bank connections link a user to a bank login (a Plaid item) and hold the
//! cursor that sync resumes from.

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    account::deactivate_accounts_for_connection,
    database_id::{BankConnectionId, UserId},
    plaid::AccessToken,
    transaction::deactivate_transactions_for_connection,
};

/// A linked bank login.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankConnection {
    /// The ID of the bank connection.
    pub id: BankConnectionId,
    /// The user that linked the bank login.
    pub user_id: UserId,
    /// Plaid's `item_id`. Unique across the whole database.
    pub item_id: String,
    /// The secret used to call Plaid on behalf of the user.
    #[serde(skip)]
    pub access_token: AccessToken,
    /// Where the next sync resumes from, `None` before the first sync.
    pub cursor: Option<String>,
    /// Cleared when the user unlinks the bank login.
    pub active: bool,
    /// Set when Plaid rejects the access token until a sync succeeds again.
    pub needs_reauth: bool,
    /// When the user's consent for data access expires, if Plaid reported it.
    #[serde(with = "time::serde::rfc3339::option")]
    pub consent_expiration_time: Option<OffsetDateTime>,
    /// When the last successful sync committed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_synced_at: Option<OffsetDateTime>,
    /// When the bank login was linked.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl BankConnection {
    /// Whether the poll job and webhooks may sync this connection.
    pub fn is_syncable(&self) -> bool {
        self.active && !self.needs_reauth
    }
}

pub fn create_bank_connection_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS bank_connection (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            item_id TEXT NOT NULL UNIQUE,
            access_token TEXT NOT NULL,
            cursor TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            needs_reauth INTEGER NOT NULL DEFAULT 0,
            consent_expiration_time TEXT,
            last_synced_at TEXT,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

const SELECT_BANK_CONNECTION: &str = "SELECT id, user_id, item_id, access_token, cursor, active, \
    needs_reauth, consent_expiration_time, last_synced_at, created_at FROM bank_connection";

pub fn map_row_to_bank_connection(row: &Row) -> Result<BankConnection, rusqlite::Error> {
    let raw_access_token: String = row.get(3)?;

    Ok(BankConnection {
        id: row.get(0)?,
        user_id: row.get(1)?,
        item_id: row.get(2)?,
        access_token: AccessToken::new(raw_access_token),
        cursor: row.get(4)?,
        active: row.get(5)?,
        needs_reauth: row.get(6)?,
        consent_expiration_time: row.get(7)?,
        last_synced_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Store a newly linked bank login with no cursor.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateItemId] if a connection for `item_id` already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_bank_connection(
    user_id: UserId,
    item_id: &str,
    access_token: &AccessToken,
    connection: &Connection,
) -> Result<BankConnection, Error> {
    connection
        .prepare(
            "INSERT INTO bank_connection (user_id, item_id, access_token, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, user_id, item_id, access_token, cursor, active, needs_reauth,
                       consent_expiration_time, last_synced_at, created_at",
        )?
        .query_row(
            (
                user_id,
                item_id,
                access_token.secret(),
                OffsetDateTime::now_utc(),
            ),
            map_row_to_bank_connection,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateItemId(item_id.to_owned()),
            error => error.into(),
        })
}

/// Look up a bank connection by Plaid's item ID, whether or not it is active.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if there is no connection for `item_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_bank_connection_by_item_id(
    item_id: &str,
    connection: &Connection,
) -> Result<BankConnection, Error> {
    connection
        .prepare(&format!("{SELECT_BANK_CONNECTION} WHERE item_id = ?1"))?
        .query_one([item_id], map_row_to_bank_connection)
        .map_err(Error::from)
}

/// Get the connections that are active and do not need re-authentication.
pub fn get_syncable_bank_connections(connection: &Connection) -> Result<Vec<BankConnection>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_BANK_CONNECTION} WHERE active = 1 AND needs_reauth = 0 ORDER BY id ASC"
        ))?
        .query_map([], map_row_to_bank_connection)?
        .map(|result| result.map_err(Error::from))
        .collect()
}

/// Move the stored cursor from `expected_cursor` to `next_cursor`.
///
/// The update only applies if the stored cursor still equals the cursor the
/// sync started from. A successful advance clears the re-authentication flag
/// and records `synced_at`.
///
/// **Note**: call this with the same transaction that wrote the synced batch
/// so that a conflict rolls back the batch too.
///
/// # Errors
/// This function will return a:
/// - [Error::CursorConflict] if the connection is missing, inactive or its
///   cursor no longer equals `expected_cursor`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn advance_cursor(
    item_id: &str,
    expected_cursor: Option<&str>,
    next_cursor: &str,
    synced_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE bank_connection
         SET cursor = ?1, needs_reauth = 0, last_synced_at = ?2
         WHERE item_id = ?3 AND active = 1 AND cursor IS ?4",
        (next_cursor, synced_at, item_id, expected_cursor),
    )?;

    if rows_affected == 0 {
        return Err(Error::CursorConflict(item_id.to_owned()));
    }

    Ok(())
}

/// Clear the stored cursor so that the next sync starts from the beginning.
///
/// # Errors
/// Returns [Error::NotFound] if there is no connection for `item_id`.
pub fn reset_cursor(item_id: &str, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE bank_connection SET cursor = NULL WHERE item_id = ?1",
        [item_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Mark a connection as needing the user to re-link the bank login.
///
/// # Errors
/// Returns [Error::NotFound] if there is no connection for `item_id`.
pub fn flag_needs_reauth(item_id: &str, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE bank_connection SET needs_reauth = 1 WHERE item_id = ?1",
        [item_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Record when the user's consent for the item expires.
///
/// # Errors
/// Returns [Error::NotFound] if there is no connection for `item_id`.
pub fn set_consent_expiration_time(
    item_id: &str,
    consent_expiration_time: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE bank_connection SET consent_expiration_time = ?1 WHERE item_id = ?2",
        (consent_expiration_time, item_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Unlink a bank login.
///
/// The connection, its accounts and their transactions are deactivated in one
/// transaction. Rows are kept so that the history is still available.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if there is no connection for `item_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn deactivate_bank_connection(item_id: &str, connection: &Connection) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    let bank_connection = get_bank_connection_by_item_id(item_id, &tx)?;

    tx.execute(
        "UPDATE bank_connection SET active = 0 WHERE id = ?1",
        [bank_connection.id],
    )?;
    let transactions = deactivate_transactions_for_connection(bank_connection.id, &tx)?;
    let accounts = deactivate_accounts_for_connection(bank_connection.id, &tx)?;

    tx.commit()?;

    tracing::info!(
        item_id,
        accounts,
        transactions,
        "Deactivated bank connection"
    );

    Ok(())
}


#[cfg(test)]
mod deactivate_bank_connection_tests {
    use time::{OffsetDateTime, macros::date};

    use crate::{
        Error,
        account::get_accounts_for_connection,
        bank_connection::{deactivate_bank_connection, get_bank_connection_by_item_id},
        test_utils::{TEST_ACCOUNT_ID, TEST_ITEM_ID, get_test_connection_with_account},
        transaction::{SyncedTransaction, get_transaction_by_external_id, upsert_transactions},
    };

    #[test]
    fn deactivates_connection_accounts_and_transactions() {
        let conn = get_test_connection_with_account();
        upsert_transactions(
            [&SyncedTransaction::new(
                "tx-1",
                TEST_ACCOUNT_ID,
                "Uber",
                6.33,
                date!(2025 - 10 - 01),
            )],
            OffsetDateTime::now_utc(),
            &conn,
        )
        .expect("Could not upsert transactions");

        deactivate_bank_connection(TEST_ITEM_ID, &conn).expect("Could not deactivate");

        let bank_connection = get_bank_connection_by_item_id(TEST_ITEM_ID, &conn)
            .expect("Could not get bank connection");
        assert!(!bank_connection.active);
        let accounts = get_accounts_for_connection(bank_connection.id, &conn)
            .expect("Could not get accounts");
        assert!(accounts.iter().all(|account| !account.active));
        let transaction =
            get_transaction_by_external_id("tx-1", &conn).expect("Could not get transaction");
        assert!(!transaction.active);
    }

    #[test]
    fn missing_connection_is_not_found() {
        let conn = get_test_connection_with_account();

        assert_eq!(deactivate_bank_connection("nope", &conn), Err(Error::NotFound));
    }
}
