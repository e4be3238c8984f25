//! Typed errors for requests to the Plaid API.

use std::fmt::Display;

/// The error code Plaid returns when the item changed while paginating through
/// `/transactions/sync`. Pagination must restart from the first cursor.
pub const MUTATION_DURING_PAGINATION: &str = "TRANSACTIONS_SYNC_MUTATION_DURING_PAGINATION";

/// Error codes meaning the access token can no longer be used until the user
/// re-links the bank through Plaid Link.
const REAUTH_ERROR_CODES: &[&str] = &[
    "ITEM_LOGIN_REQUIRED",
    "INVALID_ACCESS_TOKEN",
    "ITEM_NOT_FOUND",
    "ACCESS_NOT_GRANTED",
    "USER_PERMISSION_REVOKED",
];

/// Error types that are caused by Plaid or the bank rather than the request.
const TRANSIENT_ERROR_TYPES: &[&str] = &["RATE_LIMIT_EXCEEDED", "API_ERROR", "INSTITUTION_ERROR"];

/// How the sync loop should react to a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaidErrorKind {
    /// The request may succeed if it is sent again.
    Transient,
    /// The data changed during pagination, start again from the first cursor.
    Restart,
    /// The access token is no longer valid.
    ReauthRequired,
    /// Sending the same request again will fail the same way.
    Permanent,
}

/// An error response body from the Plaid API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The broad category of the error, e.g. "ITEM_ERROR".
    pub error_type: String,
    /// The specific error, e.g. "ITEM_LOGIN_REQUIRED".
    pub error_code: String,
    /// A developer facing description of the error.
    pub error_message: String,
    /// The HTTP status code of the response.
    pub http_status: u16,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} (HTTP {}): {}",
            self.error_type, self.error_code, self.http_status, self.error_message
        )
    }
}

/// The errors that may occur when calling the Plaid API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaidError {
    /// The request did not complete within the configured timeout.
    #[error("the request to Plaid timed out")]
    Timeout,

    /// The request could not be sent or the connection dropped.
    #[error("could not reach Plaid: {0}")]
    Network(String),

    /// Plaid answered with a structured error body.
    #[error("Plaid returned an error: {0}")]
    Api(ApiError),

    /// Plaid answered with a non-success status and a body that is not a
    /// Plaid error.
    #[error("Plaid returned HTTP {status}: {body}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("could not decode the response from Plaid: {0}")]
    InvalidResponse(String),
}

impl PlaidError {
    /// Classify the error so callers know whether to retry, restart or give up.
    pub fn kind(&self) -> PlaidErrorKind {
        match self {
            PlaidError::Timeout | PlaidError::Network(_) => PlaidErrorKind::Transient,
            PlaidError::Api(error) => {
                if error.error_code == MUTATION_DURING_PAGINATION {
                    PlaidErrorKind::Restart
                } else if REAUTH_ERROR_CODES.contains(&error.error_code.as_str()) {
                    PlaidErrorKind::ReauthRequired
                } else if TRANSIENT_ERROR_TYPES.contains(&error.error_type.as_str())
                    || is_transient_status(error.http_status)
                {
                    PlaidErrorKind::Transient
                } else {
                    PlaidErrorKind::Permanent
                }
            }
            PlaidError::UnexpectedStatus { status, .. } if is_transient_status(*status) => {
                PlaidErrorKind::Transient
            }
            PlaidError::UnexpectedStatus { .. } | PlaidError::InvalidResponse(_) => {
                PlaidErrorKind::Permanent
            }
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}
