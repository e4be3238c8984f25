//! Defines the app level error type and its conversion to JSON responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::plaid::{PlaidError, PlaidErrorKind};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A bank connection for the item already exists.
    ///
    /// Each Plaid item maps to exactly one bank connection, linking the same
    /// bank login twice must reuse the existing connection.
    #[error("a bank connection for the item \"{0}\" already exists")]
    DuplicateItemId(String),

    /// A synced transaction referenced an account that is not in the database.
    #[error("the account \"{0}\" is not in the database")]
    UnknownAccount(String),

    /// The stored cursor changed while a sync was in flight.
    ///
    /// Another sync for the same item committed first. The batch was rolled
    /// back and the next sync will resume from the newer cursor.
    #[error("the sync cursor for item \"{0}\" was advanced by another sync")]
    CursorConflict(String),

    /// The bank connection has been unlinked.
    #[error("the bank connection for item \"{0}\" is no longer active")]
    InactiveConnection(String),

    /// Plaid rejected the access token and the user must re-link the bank.
    #[error("the bank connection for item \"{0}\" must be re-authenticated")]
    ReauthRequired(String),

    /// A request to Plaid failed, after retries if the failure was transient.
    #[error("Plaid request failed: {0}")]
    Plaid(PlaidError),

    /// A webhook was missing a field its type requires.
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<PlaidError> for Error {
    fn from(value: PlaidError) -> Self {
        Error::Plaid(value)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::DuplicateItemId(_) | Error::CursorConflict(_) | Error::ReauthRequired(_) => {
                StatusCode::CONFLICT
            }
            Error::InactiveConnection(_) => StatusCode::GONE,
            Error::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            Error::Plaid(error) => plaid_error_status(error),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "An unexpected error occurred, check the server logs for more details."
                    })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// The status to respond with when a request to Plaid failed.
pub(crate) fn plaid_error_status(error: &PlaidError) -> StatusCode {
    match error.kind() {
        PlaidErrorKind::Transient | PlaidErrorKind::Restart => StatusCode::SERVICE_UNAVAILABLE,
        PlaidErrorKind::ReauthRequired | PlaidErrorKind::Permanent => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod into_response_tests {
    use axum::{body, http::StatusCode, response::IntoResponse};

    use crate::{
        Error,
        plaid::{ApiError, PlaidError},
    };

    async fn get_error_message(error: Error) -> (StatusCode, String) {
        let response = error.into_response();
        let status = response.status();
        let body = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Could not read response body");
        let json: serde_json::Value =
            serde_json::from_slice(&body).expect("Response body is not JSON");

        (status, json["error"].as_str().unwrap_or_default().to_owned())
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let (status, message) = get_error_message(Error::NotFound).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "the requested resource could not be found");
    }

    #[tokio::test]
    async fn transient_plaid_error_is_503() {
        let (status, _) = get_error_message(Error::Plaid(PlaidError::Timeout)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn permanent_plaid_error_is_502() {
        let error = PlaidError::Api(ApiError {
            error_type: "INVALID_REQUEST".to_owned(),
            error_code: "MISSING_FIELDS".to_owned(),
            error_message: "the following required fields are missing: access_token".to_owned(),
            http_status: 400,
        });

        let (status, _) = get_error_message(Error::Plaid(error)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn sql_error_hides_details() {
        let (status, message) = get_error_message(Error::SqlError(
            rusqlite::Error::InvalidColumnName("secret_column".to_owned()),
        ))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            !message.contains("secret_column"),
            "error message should not leak SQL details, got {message}"
        );
    }
}
