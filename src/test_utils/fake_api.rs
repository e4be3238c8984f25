use std::{collections::VecDeque, sync::Mutex, time::Duration};

use crate::{
    plaid::PlaidError,
    sync::{SyncPage, SyncPageRequest, TransactionSyncApi},
};

/// A [TransactionSyncApi] that answers with scripted responses in order and
/// records every request it receives.
#[derive(Debug, Default)]
pub(crate) struct FakeSyncApi {
    responses: Mutex<VecDeque<Result<SyncPage, PlaidError>>>,
    delays: Mutex<VecDeque<Duration>>,
    requests: Mutex<Vec<SyncPageRequest>>,
}

impl FakeSyncApi {
    pub(crate) fn new<const N: usize>(responses: [Result<SyncPage, PlaidError>; N]) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            ..Default::default()
        }
    }

    /// Delay the first calls, one delay per call, before they respond.
    ///
    /// A call that is cancelled during its delay does not use up a response.
    pub(crate) fn with_delays<const N: usize>(self, delays: [Duration; N]) -> Self {
        Self {
            delays: Mutex::new(VecDeque::from(delays)),
            ..self
        }
    }

    #[track_caller]
    pub(crate) fn requests(&self) -> Vec<SyncPageRequest> {
        self.requests.lock().expect("Could not lock requests").clone()
    }

    #[track_caller]
    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().expect("Could not lock requests").len()
    }
}

impl TransactionSyncApi for FakeSyncApi {
    async fn sync_transactions(&self, request: SyncPageRequest) -> Result<SyncPage, PlaidError> {
        self.requests
            .lock()
            .expect("Could not lock requests")
            .push(request);

        let delay = self.delays.lock().expect("Could not lock delays").pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .expect("Could not lock responses")
            .pop_front()
            .unwrap_or_else(|| Err(PlaidError::InvalidResponse("no scripted response".to_owned())))
    }
}
