#![allow(missing_docs)]

pub(crate) mod fake_api;

use rusqlite::Connection;
use time::macros::date;

use crate::{
    account::{SyncedAccount, upsert_account},
    bank_connection::{BankConnection, create_bank_connection},
    db::initialize,
    plaid::AccessToken,
    sync::SyncPage,
    transaction::SyncedTransaction,
};

pub(crate) use fake_api::FakeSyncApi;

/// The item of the connection created by [get_test_connection_with_account].
pub(crate) const TEST_ITEM_ID: &str = "item-test";
/// The account created by [get_test_connection_with_account].
pub(crate) const TEST_ACCOUNT_ID: &str = "account-test";

#[track_caller]
pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open database in memory");
    initialize(&connection).expect("Could not initialize database");
    connection
}

#[track_caller]
pub(crate) fn insert_test_bank_connection(item_id: &str, connection: &Connection) -> BankConnection {
    create_bank_connection(
        1,
        item_id,
        &AccessToken::new(format!("access-sandbox-{item_id}")),
        connection,
    )
    .expect("Could not create bank connection")
}

/// A database with one bank connection that has one account.
#[track_caller]
pub(crate) fn get_test_connection_with_account() -> Connection {
    let connection = get_test_connection();
    let bank_connection = insert_test_bank_connection(TEST_ITEM_ID, &connection);
    upsert_account(
        bank_connection.id,
        &SyncedAccount {
            external_id: TEST_ACCOUNT_ID.to_owned(),
            name: "Test Checking".to_owned(),
            balance: Some(100.0),
            currency: Some("USD".to_owned()),
        },
        &connection,
    )
    .expect("Could not create account");
    connection
}

/// A transaction in the account created by [get_test_connection_with_account].
pub(crate) fn test_transaction(external_id: &str, amount: f64) -> SyncedTransaction {
    SyncedTransaction::new(
        external_id,
        TEST_ACCOUNT_ID,
        "Test Transaction",
        amount,
        date!(2025 - 10 - 01),
    )
}

pub(crate) fn sync_page(
    added: Vec<SyncedTransaction>,
    modified: Vec<SyncedTransaction>,
    removed: Vec<&str>,
    next_cursor: &str,
    has_more: bool,
) -> SyncPage {
    SyncPage {
        added,
        modified,
        removed: removed.into_iter().map(str::to_owned).collect(),
        accounts: vec![],
        next_cursor: next_cursor.to_owned(),
        has_more,
    }
}
