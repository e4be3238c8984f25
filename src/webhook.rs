//! Handles the webhooks Plaid sends when an item has new data or breaks.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    bank_connection::{
        deactivate_bank_connection, flag_needs_reauth, get_bank_connection_by_item_id,
        set_consent_expiration_time,
    },
    sync::{TransactionSyncApi, sync_item},
};

/// The fields of a Plaid webhook that are used to route it.
#[derive(Debug, Deserialize)]
pub struct PlaidWebhook {
    /// The group of the webhook, e.g. "TRANSACTIONS" or "ITEM".
    pub webhook_type: String,
    /// The event within the group, e.g. "SYNC_UPDATES_AVAILABLE".
    pub webhook_code: String,
    /// The item the event is about.
    pub item_id: String,
    /// The error for `ITEM/ERROR` webhooks.
    #[serde(default)]
    pub error: Option<WebhookError>,
    /// When consent expires, for `ITEM/PENDING_EXPIRATION` webhooks.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub consent_expiration_time: Option<OffsetDateTime>,
}

/// The error attached to an `ITEM/ERROR` webhook.
#[derive(Debug, Deserialize)]
pub struct WebhookError {
    /// The specific error, e.g. "ITEM_LOGIN_REQUIRED".
    pub error_code: String,
}

/// A route handler for Plaid webhooks.
///
/// `SYNC_UPDATES_AVAILABLE` starts a sync in the background and responds with
/// 202 Accepted. Item errors and revocations update the bank connection.
/// Webhooks that need no action are acknowledged with 200 OK.
pub async fn plaid_webhook_endpoint<A>(
    State(state): State<AppState<A>>,
    Json(webhook): Json<PlaidWebhook>,
) -> Response
where
    A: TransactionSyncApi,
{
    tracing::info!(
        webhook_type = %webhook.webhook_type,
        webhook_code = %webhook.webhook_code,
        item_id = %webhook.item_id,
        "Received Plaid webhook"
    );

    let result = match (webhook.webhook_type.as_str(), webhook.webhook_code.as_str()) {
        ("TRANSACTIONS", "SYNC_UPDATES_AVAILABLE") => start_background_sync(&state, &webhook.item_id),
        ("ITEM", "ERROR") => {
            let error_code = webhook.error.as_ref().map(|error| error.error_code.as_str());

            if error_code == Some("ITEM_LOGIN_REQUIRED") {
                with_connection(&state, |connection| {
                    flag_needs_reauth(&webhook.item_id, connection)
                })
                .map(|_| acknowledged())
            } else {
                tracing::warn!(item_id = %webhook.item_id, ?error_code, "Unhandled item error");
                Ok(acknowledged())
            }
        }
        ("ITEM", "PENDING_EXPIRATION") => match webhook.consent_expiration_time {
            Some(expires) => with_connection(&state, |connection| {
                set_consent_expiration_time(&webhook.item_id, expires, connection)
            })
            .map(|_| acknowledged()),
            None => Err(Error::InvalidWebhook(
                "PENDING_EXPIRATION without consent_expiration_time".to_owned(),
            )),
        },
        ("ITEM", "USER_PERMISSION_REVOKED") => with_connection(&state, |connection| {
            deactivate_bank_connection(&webhook.item_id, connection)
        })
        .map(|_| acknowledged()),
        _ => Ok(acknowledged()),
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

fn acknowledged() -> Response {
    (StatusCode::OK, Json(json!({ "status": "acknowledged" }))).into_response()
}

fn with_connection<A, T>(
    state: &AppState<A>,
    f: impl FnOnce(&rusqlite::Connection) -> Result<T, Error>,
) -> Result<T, Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    f(&connection)
}

fn start_background_sync<A>(state: &AppState<A>, item_id: &str) -> Result<Response, Error>
where
    A: TransactionSyncApi,
{
    let bank_connection =
        with_connection(state, |connection| get_bank_connection_by_item_id(item_id, connection))?;

    if !bank_connection.active {
        return Err(Error::NotFound);
    }

    let state = state.clone();
    let item_id = item_id.to_owned();

    tokio::spawn(async move {
        // Errors are logged by the sync itself.
        let _ = sync_item(
            state.sync_api.as_ref(),
            &state.db_connection,
            &item_id,
            &state.sync_config,
        )
        .await;
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "sync started" }))).into_response())
}
