//! Ollama adapter
//!
//! Talks to a local Ollama server through its REST API:
//! - `POST /api/generate` with `stream: false` for one complete response
//! - `GET /api/tags` to check the server is up
//!
//! ## Usage
//!
//! ```rust,ignore
//! let client = OllamaClient::new("http://localhost:11434")?;
//! client.test_connection().await?;
//! ```
//!
//! Reference: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{GenerateRequest, GenerateResponse, GenerationClient, GenerationError, ResponseFormat};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connect timeout; generation time is bounded by the caller
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

/// Ollama HTTP client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    endpoint: String,
}

impl OllamaClient {
    /// Create a client for the server at `endpoint` (e.g. `http://localhost:11434`)
    pub fn new(endpoint: impl Into<String>) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.endpoint, path)
    }

    fn map_transport_error(e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(CONNECT_TIMEOUT)
        } else {
            GenerationError::Connection(e.to_string())
        }
    }
}

fn request_body(request: &GenerateRequest) -> OllamaGenerateRequest<'_> {
    OllamaGenerateRequest {
        model: &request.model,
        prompt: &request.prompt,
        format: match request.format {
            ResponseFormat::Json => Some("json"),
            ResponseFormat::Text => None,
        },
        stream: false,
    }
}

#[async_trait::async_trait]
impl GenerationClient for OllamaClient {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerationError> {
        tracing::debug!("Calling Ollama model {} ({} prompt bytes)", request.model, request.prompt.len());

        let response = self
            .client
            .post(self.url("generate"))
            .json(&request_body(request))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::map_transport_error)?;

        if !status.is_success() {
            // Ollama reports model problems as {"error": "..."}
            return Err(match serde_json::from_str::<OllamaErrorResponse>(&body) {
                Ok(err) => GenerationError::Model(err.error),
                Err(_) => GenerationError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let parsed: OllamaGenerateResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::InvalidResponse(format!("Unexpected Ollama payload: {}", e)))?;

        Ok(GenerateResponse {
            response: parsed.response,
        })
    }

    async fn test_connection(&self) -> Result<(), GenerationError> {
        let response = self
            .client
            .get(self.url("tags"))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(GenerationError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434");
        assert_eq!(client.url("generate"), "http://localhost:11434/api/generate");
    }

    #[test]
    fn json_request_body() {
        let request = GenerateRequest::json("qwen2.5-coder:14b", "lineage please");
        let body = serde_json::to_value(request_body(&request)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "model": "qwen2.5-coder:14b",
                "prompt": "lineage please",
                "format": "json",
                "stream": false
            })
        );
    }

    #[test]
    fn text_request_omits_format() {
        let request = GenerateRequest {
            model: "m".to_string(),
            prompt: "p".to_string(),
            format: ResponseFormat::Text,
        };
        let body = serde_json::to_value(request_body(&request)).unwrap();
        assert!(body.get("format").is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        // Port 9 (discard) is closed on test machines
        let client = OllamaClient::new("http://127.0.0.1:9").unwrap();
        let err = client.test_connection().await.unwrap_err();
        assert!(matches!(err, GenerationError::Connection(_) | GenerationError::Timeout(_)));
    }
}
