//! Mock LLM for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ModelError, Result};
use crate::llm::{Llm, LlmRequest};

type Handler = dyn Fn(&LlmRequest) -> Result<String> + Send + Sync;

/// A scripted [`Llm`].
///
/// Queued outcomes are consumed first, one per call; once the queue is empty
/// every call gets the handler's answer (or the default response). Every
/// request is recorded.
#[derive(Clone)]
pub struct MockLlm {
    queue: Arc<Mutex<VecDeque<Result<String>>>>,
    handler: Option<Arc<Handler>>,
    default_response: String,
    fail: bool,
    delay: Duration,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    calls: Arc<AtomicUsize>,
}

impl MockLlm {
    /// A model that always answers `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            handler: None,
            default_response: response.into(),
            fail: false,
            delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A model that answers with `responses` in order, then `"mock response"`.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::default();
        for response in responses {
            mock.push_response(response);
        }
        mock
    }

    /// A model whose every call fails with [`ModelError::Unavailable`].
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// A model that answers by calling `handler` with each request.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&LlmRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self { handler: Some(Arc::new(handler)), ..Self::default() }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a successful answer.
    pub fn push_response(&self, response: impl Into<String>) {
        self.lock_queue().push_back(Ok(response.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: ModelError) {
        self.lock_queue().push_back(Err(error));
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// All requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The prompt of the most recent request.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests().pop().map(|r| r.prompt)
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new("mock response")
    }
}

impl std::fmt::Debug for MockLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLlm")
            .field("default_response", &self.default_response)
            .field("fail", &self.fail)
            .field("delay", &self.delay)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &LlmRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
            requests.push(request.clone());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ModelError::unavailable("mock", "mock LLM error"));
        }
        let queued = self.lock_queue().pop_front();
        if let Some(outcome) = queued {
            return outcome;
        }
        match &self.handler {
            Some(handler) => handler(request),
            None => Ok(self.default_response.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_responses_come_first() {
        let llm = MockLlm::with_responses(["one", "two"]);
        let request = LlmRequest::new("q");
        assert_eq!(llm.generate(&request).await.unwrap(), "one");
        assert_eq!(llm.generate(&request).await.unwrap(), "two");
        assert_eq!(llm.generate(&request).await.unwrap(), "mock response");
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn queued_error_is_returned_once() {
        let llm = MockLlm::new("ok");
        llm.push_error(ModelError::unavailable("mock", "boom"));
        let request = LlmRequest::new("q");
        assert!(llm.generate(&request).await.is_err());
        assert_eq!(llm.generate(&request).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn handler_sees_the_prompt() {
        let llm = MockLlm::from_fn(|r| Ok(format!("echo: {}", r.prompt)));
        assert_eq!(llm.generate(&LlmRequest::new("hi")).await.unwrap(), "echo: hi");
        assert_eq!(llm.last_prompt().as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn failing_model_records_calls() {
        let llm = MockLlm::failing();
        let err = llm.generate(&LlmRequest::new("q")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(llm.requests().len(), 1);
    }
}
