//! Piggy Bank keeps a local copy of the accounts and transactions of bank
//! logins linked through Plaid.
//!
//! This library provides the transaction sync: a cursor loop that pages
//! through Plaid's `/transactions/sync` change feed, a writer that applies the
//! changes to a SQLite database, and a REST API with webhook and poll triggers.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod account;
mod app_state;
mod bank_connection;
mod config;
mod connection_endpoints;
mod database_id;
mod db;
pub mod endpoints;
mod error;
mod jobs;
mod logging;
mod plaid;
mod routing;
mod sync;
mod sync_endpoint;
mod transaction;
mod webhook;

#[cfg(test)]
mod test_utils;

pub use account::{Account, SyncedAccount, get_accounts_for_connection};
pub use app_state::AppState;
pub use bank_connection::{BankConnection, create_bank_connection, get_bank_connection_by_item_id};
pub use config::SyncConfig;
pub use database_id::{AccountId, BankConnectionId, DatabaseId, TransactionId, UserId};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use jobs::poll_connections_task;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use plaid::{AccessToken, ApiError, PlaidClient, PlaidEnvironment, PlaidError, PlaidErrorKind};
pub use routing::build_router;
pub use sync::{
    AppliedBatch, FetchError, FetchedTransactions, SyncBatch, SyncPage, SyncPageRequest,
    SyncSummary, TransactionSyncApi, apply_batch, commit_sync, fetch_transactions, resync_item,
    sync_all_connections, sync_item,
};
pub use transaction::{
    SyncedTransaction, Transaction, count_transactions, get_transaction_by_external_id,
    get_transactions_for_connection,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
