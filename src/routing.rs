//! Application router configuration.

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    AppState,
    connection_endpoints::{
        delete_connection_endpoint, get_connection_endpoint, resync_connection_endpoint,
    },
    endpoints,
    logging::logging_middleware,
    sync::TransactionSyncApi,
    sync_endpoint::sync_endpoint,
    webhook::plaid_webhook_endpoint,
};

/// Return a router with all the app's routes.
pub fn build_router<A>(state: AppState<A>) -> Router
where
    A: TransactionSyncApi,
{
    Router::new()
        .route(endpoints::SYNC, post(sync_endpoint::<A>))
        .route(endpoints::PLAID_WEBHOOK, post(plaid_webhook_endpoint::<A>))
        .route(
            endpoints::CONNECTION,
            get(get_connection_endpoint).delete(delete_connection_endpoint),
        )
        .route(
            endpoints::CONNECTION_RESYNC,
            post(resync_connection_endpoint::<A>),
        )
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}
