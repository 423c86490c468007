//! Mock generation client for testing
//!
//! Returns canned responses without a model server. It's useful for:
//! - Unit testing the extractor's response handling
//! - Simulating slow or failing backends
//! - Checking how many calls were made and how many overlapped
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sqlineage_llm::MockGenerator;
//!
//! let mock = MockGenerator::new()
//!     .with_response("usp_load_orders", r#"{"lineage": [{"source": "stg.orders", "target": "dbo.orders"}]}"#)
//!     .with_failure("usp_broken")
//!     .with_latency(50);
//!
//! let client: Arc<dyn GenerationClient> = Arc::new(mock.clone());
//! // ... run the extractor ...
//! assert_eq!(mock.call_count(), 3);
//! ```
//!
//! Responses are chosen by substring match against the prompt, so keying
//! them on the object name works with any template that mentions it.

use crate::client::{GenerateRequest, GenerateResponse, GenerationClient, GenerationError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Response used when no rule matches
const EMPTY_LINEAGE: &str = r#"{"lineage": []}"#;

/// Mock generation client
///
/// Clones share call counters and the prompt log, so a test can keep one
/// handle while the extractor owns another.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    /// `(needle, response)` rules, first match wins
    responses: Vec<(String, String)>,

    /// Prompts containing any of these fail with a connection error
    failures: Vec<String>,

    /// Response when no rule matches
    default_response: String,

    /// Simulated generation time
    latency: Duration,

    /// Simulate an unreachable server
    fail_connection: bool,

    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

/// Decrements the in-flight counter even when the call is cancelled
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockGenerator {
    /// Create a mock that answers every prompt with an empty lineage list
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            failures: Vec::new(),
            default_response: EMPTY_LINEAGE.to_string(),
            latency: Duration::ZERO,
            fail_connection: false,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer prompts containing `needle` with `response`
    pub fn with_response(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.push((needle.into(), response.into()));
        self
    }

    /// Fail prompts containing `needle`
    pub fn with_failure(mut self, needle: impl Into<String>) -> Self {
        self.failures.push(needle.into());
        self
    }

    /// Response when no rule matches
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Delay every call by `latency_ms` milliseconds
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency = Duration::from_millis(latency_ms);
        self
    }

    /// Make `test_connection` fail
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Calls started so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in progress at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn record_prompt(&self, prompt: &str) {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GenerationClient for MockGenerator {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.record_prompt(&request.prompt);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failures.iter().any(|needle| request.prompt.contains(needle.as_str())) {
            return Err(GenerationError::Connection("Simulated generation failure".to_string()));
        }

        let response = self
            .responses
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone());

        Ok(GenerateResponse { response })
    }

    async fn test_connection(&self) -> Result<(), GenerationError> {
        if self.fail_connection {
            Err(GenerationError::Connection("Simulated connection failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_response_is_empty_lineage() {
        let mock = MockGenerator::new();
        let response = mock.generate(&GenerateRequest::json("m", "anything")).await.unwrap();
        assert_eq!(response.response, EMPTY_LINEAGE);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn rules_match_on_prompt_substring() {
        let mock = MockGenerator::new()
            .with_response("usp_a", "not json")
            .with_failure("usp_b");

        let a = mock.generate(&GenerateRequest::json("m", "object dbo.usp_a")).await.unwrap();
        assert_eq!(a.response, "not json");

        let b = mock.generate(&GenerateRequest::json("m", "object dbo.usp_b")).await;
        assert!(matches!(b, Err(GenerationError::Connection(_))));

        assert_eq!(mock.prompts(), vec!["object dbo.usp_a", "object dbo.usp_b"]);
    }

    #[tokio::test]
    async fn clones_share_counters() {
        let mock = MockGenerator::new();
        let handle = mock.clone();
        mock.generate(&GenerateRequest::json("m", "p")).await.unwrap();
        assert_eq!(handle.call_count(), 1);
        assert_eq!(handle.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn connection_failure() {
        let mock = MockGenerator::new().with_connection_failure();
        assert!(mock.test_connection().await.is_err());
        assert!(MockGenerator::new().test_connection().await.is_ok());
    }

    #[tokio::test]
    async fn overlapping_calls_are_counted() {
        let mock = MockGenerator::new().with_latency(100);
        let request = GenerateRequest::json("m", "p");

        let (a, b) = tokio::join!(mock.generate(&request), mock.generate(&request));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(mock.max_in_flight(), 2);
    }
}
