//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, config::SyncConfig, db::initialize, plaid::PlaidClient};

/// The state of the REST server.
///
/// `A` is the API used to fetch transactions. It is [PlaidClient] outside of
/// tests.
pub struct AppState<A = PlaidClient> {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The API that pages of transactions are fetched from.
    pub sync_api: Arc<A>,

    /// The config that controls paging, retries and polling.
    pub sync_config: Arc<SyncConfig>,
}

impl<A> AppState<A> {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for
    /// bank connections, accounts and transactions.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, sync_api: A, sync_config: SyncConfig) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            sync_api: Arc::new(sync_api),
            sync_config: Arc::new(sync_config),
        })
    }
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            db_connection: self.db_connection.clone(),
            sync_api: self.sync_api.clone(),
            sync_config: self.sync_config.clone(),
        }
    }
}
