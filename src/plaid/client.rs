//! An HTTP client for Plaid built on reqwest.

use std::fmt::Debug;

use clap::ValueEnum;

use crate::{
    plaid::{
        error::{ApiError, PlaidError},
        models::{ErrorResponseBody, SyncRequestBody, SyncResponseBody},
    },
    sync::{SyncPage, SyncPageRequest, TransactionSyncApi},
};

/// The Plaid environment to send requests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlaidEnvironment {
    /// Test credentials and fake banks.
    Sandbox,
    /// Real banks.
    Production,
}

impl PlaidEnvironment {
    /// The base URL of the environment's API.
    pub fn base_url(self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.plaid.com",
            PlaidEnvironment::Production => "https://production.plaid.com",
        }
    }
}

/// Sends requests to the Plaid API with the app's client credentials.
#[derive(Clone)]
pub struct PlaidClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    secret: String,
}

impl PlaidClient {
    /// Create a client for `environment`.
    pub fn new(environment: PlaidEnvironment, client_id: &str, secret: &str) -> Self {
        Self::with_base_url(environment.base_url(), client_id, secret)
    }

    /// Create a client that sends requests to `base_url`, e.g. a local mock
    /// server.
    pub fn with_base_url(base_url: &str, client_id: &str, secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            client_id: client_id.to_owned(),
            secret: secret.to_owned(),
        }
    }
}

impl Debug for PlaidClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaidClient")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl TransactionSyncApi for PlaidClient {
    async fn sync_transactions(&self, request: SyncPageRequest) -> Result<SyncPage, PlaidError> {
        let body = SyncRequestBody {
            client_id: &self.client_id,
            secret: &self.secret,
            access_token: request.access_token.secret(),
            cursor: request.cursor.as_deref(),
            count: request.count,
        };

        let response = self
            .http
            .post(format!("{}/transactions/sync", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(parse_error_response(status.as_u16(), &bytes));
        }

        serde_json::from_slice::<SyncResponseBody>(&bytes)
            .map(SyncPage::from)
            .map_err(|error| PlaidError::InvalidResponse(error.to_string()))
    }
}

fn map_reqwest_error(error: reqwest::Error) -> PlaidError {
    if error.is_timeout() {
        PlaidError::Timeout
    } else {
        PlaidError::Network(error.to_string())
    }
}

fn parse_error_response(status: u16, body: &[u8]) -> PlaidError {
    match serde_json::from_slice::<ErrorResponseBody>(body) {
        Ok(error) => PlaidError::Api(ApiError {
            error_type: error.error_type,
            error_code: error.error_code,
            error_message: error.error_message,
            http_status: status,
        }),
        Err(_) => PlaidError::UnexpectedStatus {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

#[cfg(test)]
mod parse_error_response_tests {
    use crate::plaid::{
        PlaidErrorKind,
        client::{PlaidClient, parse_error_response},
        error::{ApiError, PlaidError},
    };

    #[test]
    fn parses_plaid_error_body() {
        let body = br#"{
            "display_message": null,
            "error_code": "ITEM_LOGIN_REQUIRED",
            "error_message": "the login details of this item have changed",
            "error_type": "ITEM_ERROR",
            "request_id": "m8MDnv9okwxFNBV"
        }"#;

        let got = parse_error_response(400, body);

        assert_eq!(
            got,
            PlaidError::Api(ApiError {
                error_type: "ITEM_ERROR".to_owned(),
                error_code: "ITEM_LOGIN_REQUIRED".to_owned(),
                error_message: "the login details of this item have changed".to_owned(),
                http_status: 400,
            })
        );
        assert_eq!(got.kind(), PlaidErrorKind::ReauthRequired);
    }

    #[test]
    fn non_plaid_body_keeps_status() {
        let got = parse_error_response(503, b"<html>Service Unavailable</html>");

        assert_eq!(
            got,
            PlaidError::UnexpectedStatus {
                status: 503,
                body: "<html>Service Unavailable</html>".to_owned()
            }
        );
        assert_eq!(got.kind(), PlaidErrorKind::Transient);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let client = PlaidClient::with_base_url("http://localhost/", "client-id", "shh-secret");

        let got = format!("{client:?}");

        assert!(!got.contains("shh-secret"), "got {got}");
        assert!(got.contains("http://localhost"), "got {got}");
    }
}
