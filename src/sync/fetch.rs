//! The cursor loop that pages through an item's changes.

use crate::{
    Error,
    config::SyncConfig,
    plaid::{AccessToken, PlaidError, PlaidErrorKind},
    sync::{SyncBatch, SyncPage, SyncPageRequest, TransactionSyncApi},
};

/// Every change after the starting cursor and the cursor to resume from next
/// time.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTransactions {
    /// The folded changes of every page.
    pub batch: SyncBatch,
    /// The `next_cursor` of the last page.
    pub cursor: String,
    /// The number of pages that made up the batch.
    pub pages: usize,
}

/// A failed fetch. Nothing fetched before the failure is kept.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("could not fetch transactions after cursor {cursor:?}: {error}")]
pub struct FetchError {
    /// The cursor the fetch started from. Resume from here.
    pub cursor: Option<String>,
    /// The error of the page that failed.
    pub error: PlaidError,
}

impl From<FetchError> for Error {
    fn from(value: FetchError) -> Self {
        Error::Plaid(value.error)
    }
}

/// Page through the changes after `start_cursor` until Plaid reports there are
/// no more.
///
/// Each page is retried on transient errors. If the item changes during
/// pagination the loop starts over from `start_cursor` with an empty batch, up
/// to [SyncConfig::max_restarts] times.
///
/// # Errors
/// Returns a [FetchError] holding `start_cursor` if a page fails for good.
pub async fn fetch_transactions<A>(
    api: &A,
    access_token: &AccessToken,
    start_cursor: Option<&str>,
    config: &SyncConfig,
) -> Result<FetchedTransactions, FetchError>
where
    A: TransactionSyncApi,
{
    let mut restarts = 0;

    'restart: loop {
        let mut batch = SyncBatch::default();
        let mut cursor = start_cursor.map(str::to_owned);
        let mut pages = 0;

        loop {
            let request = SyncPageRequest {
                access_token: access_token.clone(),
                cursor: cursor.clone(),
                count: config.page_size,
            };

            let page = match fetch_page(api, request, config).await {
                Ok(page) => page,
                Err(error)
                    if error.kind() == PlaidErrorKind::Restart
                        && restarts < config.max_restarts =>
                {
                    restarts += 1;
                    tracing::warn!(
                        restarts,
                        discarded_pages = pages,
                        "Item changed during pagination, starting over"
                    );
                    continue 'restart;
                }
                Err(error) => {
                    return Err(FetchError {
                        cursor: start_cursor.map(str::to_owned),
                        error,
                    });
                }
            };

            pages += 1;
            let has_more = page.has_more;
            let next_cursor = page.next_cursor.clone();
            tracing::debug!(
                page = pages,
                added = page.added.len(),
                modified = page.modified.len(),
                removed = page.removed.len(),
                has_more,
                "Fetched page"
            );
            batch.push_page(page);

            if !has_more {
                return Ok(FetchedTransactions {
                    batch,
                    cursor: next_cursor,
                    pages,
                });
            }

            cursor = Some(next_cursor);
        }
    }
}

/// Fetch a single page, retrying transient failures with capped exponential
/// backoff.
async fn fetch_page<A>(
    api: &A,
    request: SyncPageRequest,
    config: &SyncConfig,
) -> Result<SyncPage, PlaidError>
where
    A: TransactionSyncApi,
{
    let mut attempt = 0;

    loop {
        let result = tokio::time::timeout(
            config.request_timeout,
            api.sync_transactions(request.clone()),
        )
        .await
        .unwrap_or(Err(PlaidError::Timeout));

        match result {
            Ok(page) => {
                if attempt > 0 {
                    tracing::info!(attempt, "Plaid request succeeded after retry");
                }
                return Ok(page);
            }
            Err(error)
                if error.kind() == PlaidErrorKind::Transient && attempt < config.max_retries =>
            {
                attempt += 1;
                let delay = config.backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient error from Plaid, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}
