//! Mock implementations for testing
//!
//! Executor test doubles with scripted results and request recording.
//! The in-memory repositories and queues from `dialer-infrastructure`
//! are re-exported here so tests only need one import.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use dialer_core::traits::{CallExecutor, CallRequest};
use dialer_core::{DialerError, DialerResult};

pub use dialer_infrastructure::{
    InMemoryCallEventQueue, InMemoryDispatchQueue, MemoryCallAttemptRepository,
    MemoryCampaignRepository, MemoryLeadRepository,
};

/// Mock call executor that records every request it receives.
///
/// By default each call succeeds with a generated correlation id.
/// Results can be scripted in order with `push_result`; once the
/// script runs out the executor falls back to generated ids.
pub struct MockCallExecutor {
    requests: Arc<Mutex<Vec<CallRequest>>>,
    scripted: Arc<Mutex<VecDeque<DialerResult<String>>>>,
}

impl MockCallExecutor {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            scripted: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queue the result for the next call in FIFO order.
    pub async fn push_result(&self, result: DialerResult<String>) {
        self.scripted.lock().await.push_back(result);
    }

    /// All requests received so far, in call order.
    pub async fn requests(&self) -> Vec<CallRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl Default for MockCallExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallExecutor for MockCallExecutor {
    async fn place_call(&self, request: &CallRequest) -> DialerResult<String> {
        self.requests.lock().await.push(request.clone());
        if let Some(result) = self.scripted.lock().await.pop_front() {
            return result;
        }
        Ok(Uuid::new_v4().to_string())
    }
}

/// Call executor that always fails, for infrastructure failure paths.
pub struct FailingCallExecutor;

#[async_trait]
impl CallExecutor for FailingCallExecutor {
    async fn place_call(&self, _request: &CallRequest) -> DialerResult<String> {
        Err(DialerError::ExecutorUnavailable(
            "provider unreachable".to_string(),
        ))
    }
}
