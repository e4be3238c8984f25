//! Defines the endpoints for reading, unlinking and resyncing a bank connection.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    account::{Account, get_accounts_for_connection},
    bank_connection::{BankConnection, deactivate_bank_connection, get_bank_connection_by_item_id},
    sync::{TransactionSyncApi, resync_item},
};

/// The state needed to read or unlink a bank connection.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// The database connection for managing bank connections.
    db_connection: Arc<Mutex<Connection>>,
}

impl<A> FromRef<AppState<A>> for ConnectionState {
    fn from_ref(state: &AppState<A>) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A bank connection with its accounts.
#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    /// The bank connection, without its access token.
    #[serde(flatten)]
    pub connection: BankConnection,
    /// The accounts of the bank connection.
    pub accounts: Vec<Account>,
}

/// A route handler for the sync status of a bank connection.
pub async fn get_connection_endpoint(
    State(state): State<ConnectionState>,
    Path(item_id): Path<String>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_connection_status(&item_id, &connection) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(error) => error.into_response(),
    }
}

fn get_connection_status(item_id: &str, connection: &Connection) -> Result<ConnectionStatus, Error> {
    let bank_connection = get_bank_connection_by_item_id(item_id, connection)?;
    let accounts = get_accounts_for_connection(bank_connection.id, connection)?;

    Ok(ConnectionStatus {
        connection: bank_connection,
        accounts,
    })
}

/// A route handler for unlinking a bank connection.
///
/// The connection, its accounts and transactions are kept but marked inactive.
pub async fn delete_connection_endpoint(
    State(state): State<ConnectionState>,
    Path(item_id): Path<String>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match deactivate_bank_connection(&item_id, &connection) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => {
            tracing::error!("Could not unlink bank connection {item_id}: {error}");
            error.into_response()
        }
    }
}

/// A route handler that clears the cursor of a bank connection and syncs it
/// from the beginning.
pub async fn resync_connection_endpoint<A>(
    State(state): State<AppState<A>>,
    Path(item_id): Path<String>,
) -> Response
where
    A: TransactionSyncApi,
{
    match resync_item(
        state.sync_api.as_ref(),
        &state.db_connection,
        &item_id,
        &state.sync_config,
    )
    .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error.into_response(),
    }
}
