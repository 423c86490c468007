//! Generation client trait

use std::time::Duration;

/// Output format requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Ask the backend to constrain output to JSON
    Json,

    /// Free text
    Text,
}

/// One generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Model identifier (e.g. `qwen2.5-coder:14b`)
    pub model: String,

    /// Fully rendered prompt
    pub prompt: String,

    /// Requested output format
    pub format: ResponseFormat,
}

impl GenerateRequest {
    /// Request JSON output
    pub fn json(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            format: ResponseFormat::Json,
        }
    }
}

/// Text returned by the model
///
/// Requesting JSON does not guarantee JSON; callers must still validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateResponse {
    /// Generated text
    pub response: String,
}

/// Errors that can occur when calling the generation service
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A backend that can turn a prompt into text
///
/// Implementations must be safe to call concurrently; the extractor bounds
/// how many calls are in flight, the client does not need to.
#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    /// Backend name for logs (e.g. "Ollama")
    fn name(&self) -> &'static str;

    /// Run one generation
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerationError>;

    /// Check that the backend is reachable
    async fn test_connection(&self) -> Result<(), GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_request() {
        let request = GenerateRequest::json("m", "p");
        assert_eq!(request.format, ResponseFormat::Json);
        assert_eq!(request.model, "m");
    }

    #[test]
    fn error_messages() {
        let err = GenerationError::Status { status: 404, body: "model not found".to_string() };
        assert_eq!(err.to_string(), "Service returned HTTP 404: model not found");
    }
}
