//! The client for Plaid's `/transactions/sync` endpoint.

mod client;
mod error;
mod models;

use std::fmt::Debug;

pub use client::{PlaidClient, PlaidEnvironment};
pub use error::{ApiError, PlaidError, PlaidErrorKind};

/// The secret that grants access to a user's bank data through Plaid.
///
/// The token is never printed in logs. Use [AccessToken::secret] where the raw
/// value is needed, i.e. when calling Plaid or writing to the database.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw access token.
    pub fn new(token: String) -> Self {
        Self(token)
    }

    /// The raw access token.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(********)")
    }
}
