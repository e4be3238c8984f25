//! Defines the endpoint that triggers a sync.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppState, Error,
    account::SyncedAccount,
    error::plaid_error_status,
    plaid::AccessToken,
    sync::{FetchError, FetchedTransactions, TransactionSyncApi, fetch_transactions, sync_item},
    transaction::SyncedTransaction,
};

/// The body of a sync request.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SyncRequest {
    /// Sync a stored bank connection and commit the changes.
    Item {
        /// Plaid's `item_id` of the connection.
        item_id: String,
    },
    /// Fetch the changes after `cursor` without writing them. The caller is
    /// responsible for storing the changes and the returned cursor.
    AccessToken {
        /// The access token of the item to read.
        access_token: String,
        /// The cursor to start from, omitted to start from the beginning.
        #[serde(default)]
        cursor: Option<String>,
    },
}

/// The changes after the request cursor for [SyncRequest::AccessToken].
#[derive(Debug, Serialize)]
pub struct FetchedDelta<'a> {
    added: Vec<&'a SyncedTransaction>,
    modified: Vec<&'a SyncedTransaction>,
    removed: Vec<String>,
    accounts: Vec<&'a SyncedAccount>,
    next_cursor: &'a str,
    pages: usize,
}

impl<'a> From<&'a FetchedTransactions> for FetchedDelta<'a> {
    fn from(fetched: &'a FetchedTransactions) -> Self {
        Self {
            added: fetched.batch.added().collect(),
            modified: fetched.batch.modified().collect(),
            removed: fetched.batch.removed(),
            accounts: fetched.batch.accounts().collect(),
            next_cursor: &fetched.cursor,
            pages: fetched.pages,
        }
    }
}

/// A route handler for syncing transactions.
///
/// An `item_id` body syncs the stored connection and responds with a
/// [crate::sync::SyncSummary]. An `access_token` body responds with the
/// changes and the next cursor.
pub async fn sync_endpoint<A>(
    State(state): State<AppState<A>>,
    Json(request): Json<SyncRequest>,
) -> Response
where
    A: TransactionSyncApi,
{
    match request {
        SyncRequest::Item { item_id } => match sync_item(
            state.sync_api.as_ref(),
            &state.db_connection,
            &item_id,
            &state.sync_config,
        )
        .await
        {
            Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
            Err(error) => error.into_response(),
        },
        SyncRequest::AccessToken {
            access_token,
            cursor,
        } => {
            let access_token = AccessToken::new(access_token);

            match fetch_transactions(
                state.sync_api.as_ref(),
                &access_token,
                cursor.as_deref(),
                &state.sync_config,
            )
            .await
            {
                Ok(fetched) => (StatusCode::OK, Json(FetchedDelta::from(&fetched))).into_response(),
                Err(error) => fetch_error_response(error),
            }
        }
    }
}

/// Respond with the cursor the caller should retry from.
fn fetch_error_response(error: FetchError) -> Response {
    tracing::error!("Could not fetch transactions: {error}");

    (
        plaid_error_status(&error.error),
        Json(json!({
            "error": Error::Plaid(error.error).to_string(),
            "cursor": error.cursor,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod sync_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        AppState,
        bank_connection::get_bank_connection_by_item_id,
        config::SyncConfig,
        endpoints,
        plaid::PlaidError,
        sync_endpoint::sync_endpoint,
        test_utils::{
            FakeSyncApi, TEST_ITEM_ID, get_test_connection_with_account, sync_page,
            test_transaction,
        },
        transaction::count_transactions,
    };

    fn get_test_server(api: FakeSyncApi) -> (TestServer, AppState<FakeSyncApi>) {
        let state = AppState {
            db_connection: Arc::new(Mutex::new(get_test_connection_with_account())),
            sync_api: Arc::new(api),
            sync_config: Arc::new(SyncConfig::default()),
        };
        let app = Router::new()
            .route(endpoints::SYNC, post(sync_endpoint::<FakeSyncApi>))
            .with_state(state.clone());

        (
            TestServer::try_new(app).expect("Could not create test server."),
            state,
        )
    }

    #[tokio::test]
    async fn item_sync_commits_and_returns_summary() {
        let (server, state) = get_test_server(FakeSyncApi::new([
            Ok(sync_page(vec![test_transaction("a", 1.0)], vec![], vec![], "c1", true)),
            Ok(sync_page(vec![test_transaction("b", 2.0)], vec![], vec![], "c2", false)),
        ]));

        let response = server
            .post(endpoints::SYNC)
            .json(&json!({ "item_id": TEST_ITEM_ID }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["added"], 2);
        assert_eq!(body["pages"], 2);
        assert_eq!(body["cursor"], "c2");
        let conn = state.db_connection.lock().expect("Could not lock database");
        assert_eq!(count_transactions(&conn), Ok(2));
        let bank_connection =
            get_bank_connection_by_item_id(TEST_ITEM_ID, &conn).expect("Could not get connection");
        assert_eq!(bank_connection.cursor.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn unknown_item_is_404() {
        let (server, _) = get_test_server(FakeSyncApi::new([]));

        let response = server
            .post(endpoints::SYNC)
            .json(&json!({ "item_id": "nope" }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn access_token_sync_returns_delta_without_writing() {
        let (server, state) = get_test_server(FakeSyncApi::new([Ok(sync_page(
            vec![test_transaction("a", 1.0)],
            vec![],
            vec!["gone"],
            "c1",
            false,
        ))]));

        let response = server
            .post(endpoints::SYNC)
            .json(&json!({ "access_token": "access-sandbox-1", "cursor": "c0" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["next_cursor"], "c1");
        assert_eq!(body["added"][0]["external_id"], "a");
        assert_eq!(body["removed"], json!(["gone"]));
        let conn = state.db_connection.lock().expect("Could not lock database");
        assert_eq!(count_transactions(&conn), Ok(0));
        let requests = state.sync_api.requests();
        assert_eq!(requests[0].cursor.as_deref(), Some("c0"));
        assert_eq!(requests[0].access_token.secret(), "access-sandbox-1");
    }

    #[tokio::test]
    async fn access_token_failure_returns_start_cursor() {
        let (server, _) = get_test_server(FakeSyncApi::new([
            Ok(sync_page(vec![test_transaction("a", 1.0)], vec![], vec![], "c1", true)),
            Err(PlaidError::InvalidResponse("truncated".to_owned())),
        ]));

        let response = server
            .post(endpoints::SYNC)
            .json(&json!({ "access_token": "access-sandbox-1", "cursor": "c0" }))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["cursor"], "c0");
    }

    #[tokio::test]
    async fn body_without_item_or_token_is_rejected() {
        let (server, _) = get_test_server(FakeSyncApi::new([]));

        let response = server
            .post(endpoints::SYNC)
            .json(&json!({ "cursor": "c0" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }
}
