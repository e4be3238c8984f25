//! Financial accounts that belong to a bank connection.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{AccountId, BankConnectionId},
};

/// A bank account or credit card reported by Plaid for a linked bank login.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The bank connection the account was reported by.
    pub bank_connection_id: BankConnectionId,
    /// Plaid's `account_id`.
    pub external_id: String,
    /// The display name of the account.
    pub name: String,
    /// The current balance, if the bank reports one.
    pub balance: Option<f64>,
    /// The ISO currency code of the balance.
    pub currency: Option<String>,
    /// Cleared when the bank connection is unlinked.
    pub active: bool,
}

/// An account as reported in a Plaid sync response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedAccount {
    /// Plaid's `account_id`.
    pub external_id: String,
    /// The display name of the account.
    pub name: String,
    /// The current balance.
    pub balance: Option<f64>,
    /// The ISO currency code of the balance.
    pub currency: Option<String>,
}

pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            bank_connection_id INTEGER NOT NULL,
            external_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            balance REAL,
            currency TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(bank_connection_id) REFERENCES bank_connection(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_bank_connection ON account(bank_connection_id);",
        (),
    )?;

    Ok(())
}

pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        bank_connection_id: row.get(1)?,
        external_id: row.get(2)?,
        name: row.get(3)?,
        balance: row.get(4)?,
        currency: row.get(5)?,
        active: row.get(6)?,
    })
}

/// Insert an account or update its name and balance if it already exists.
///
/// An account that shows up in a sync response is active again, even if it
/// had been deactivated.
///
/// # Errors
/// Returns [Error::SqlError] if `bank_connection_id` does not refer to a bank
/// connection or there is some other SQL error.
pub fn upsert_account(
    bank_connection_id: BankConnectionId,
    account: &SyncedAccount,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(
            "INSERT INTO account (bank_connection_id, external_id, name, balance, currency)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(external_id) DO UPDATE SET
                 name = excluded.name,
                 balance = excluded.balance,
                 currency = excluded.currency,
                 active = 1
             RETURNING id, bank_connection_id, external_id, name, balance, currency, active",
        )?
        .query_row(
            (
                bank_connection_id,
                &account.external_id,
                &account.name,
                account.balance,
                &account.currency,
            ),
            map_row_to_account,
        )
        .map_err(Error::from)
}

/// Get the accounts for a bank connection, ordered by name.
pub fn get_accounts_for_connection(
    bank_connection_id: BankConnectionId,
    connection: &Connection,
) -> Result<Vec<Account>, Error> {
    connection
        .prepare(
            "SELECT id, bank_connection_id, external_id, name, balance, currency, active
             FROM account
             WHERE bank_connection_id = ?1
             ORDER BY name ASC",
        )?
        .query_map([bank_connection_id], map_row_to_account)?
        .map(|result| result.map_err(Error::from))
        .collect()
}

/// Soft delete every account that belongs to a bank connection.
///
/// Returns the number of accounts that were deactivated.
pub fn deactivate_accounts_for_connection(
    bank_connection_id: BankConnectionId,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "UPDATE account SET active = 0 WHERE bank_connection_id = ?1 AND active = 1",
            [bank_connection_id],
        )
        .map_err(Error::from)
}
