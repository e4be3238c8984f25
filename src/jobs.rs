//! Background jobs that run alongside the server.

use std::time::Duration;

use crate::{
    AppState,
    sync::{TransactionSyncApi, sync_all_connections},
};

/// Sync every active connection each `interval`, forever.
///
/// The first sync runs immediately. Connections flagged for re-authentication
/// are skipped until a successful sync clears the flag.
pub async fn poll_connections_task<A>(state: AppState<A>, interval: Duration)
where
    A: TransactionSyncApi,
{
    // The first tick fires immediately.
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        tracing::info!("Running poll_connections_task...");

        let results = match sync_all_connections(
            state.sync_api.clone(),
            state.db_connection.clone(),
            state.sync_config.clone(),
        )
        .await
        {
            Ok(results) => results,
            Err(error) => {
                tracing::error!("An error occurred while listing connections to sync: {error}");
                continue;
            }
        };

        let failed = results.iter().filter(|(_, result)| result.is_err()).count();

        tracing::info!(
            synced = results.len() - failed,
            failed,
            "Finished running poll_connections_task"
        );
    }
}
