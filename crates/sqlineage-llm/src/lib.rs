//! Generation service clients for lineage extraction
//!
//! The extractor only needs one capability from a language model backend:
//! turn a prompt into text, preferably JSON. This crate provides the trait
//! for that capability, an adapter for a local Ollama server, a mock for
//! tests, and the prompt template the extractor renders per object.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlineage_llm::{GenerationClient, GenerateRequest, OllamaClient};
//!
//! let client = OllamaClient::new("http://localhost:11434")?;
//! let request = GenerateRequest::json("qwen2.5-coder:14b", prompt);
//! let response = client.generate(&request).await?;
//! ```

pub mod client;
pub mod ollama;
pub mod mock;
pub mod prompt;

pub use client::{GenerationClient, GenerateRequest, GenerateResponse, GenerationError, ResponseFormat};
pub use ollama::OllamaClient;
pub use mock::MockGenerator;
pub use prompt::{PromptError, PromptTemplate};
