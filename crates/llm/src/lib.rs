//! LLM integration module providing abstraction over different chat providers
//!
//! This module implements:
//! - Common interface for streaming generation via the ChatProvider trait
//! - Support for Gemini, OpenAI, OpenRouter and Ollama
//! - Line-oriented stream decoding shared by all providers
//! - Shared types and error kinds


mod utils;

pub mod factory;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod openrouter;
pub mod streaming;
pub mod types;

pub use factory::ProviderId;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use openrouter::OpenRouterClient;
pub use types::*;

use async_trait::async_trait;

/// Structure to represent the streaming events a provider emits
#[derive(Debug, Clone, PartialEq)]
pub enum StreamingChunk {
    /// Incremental text extracted from one frame
    Text(String),
    /// The response body ended and every frame was processed
    StreamingComplete,
}

/// Returning an error from the callback stops the stream.
pub type StreamingCallback = Box<dyn Fn(&StreamingChunk) -> Result<(), ApiError> + Send + Sync>;

/// Trait for the different provider implementations
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short identifier used in logs and error messages
    fn name(&self) -> &'static str;

    /// Streams a reply to `prompt`, given the prior `history`.
    ///
    /// Calls `streaming_callback` with one `Text` per delta in frame order and
    /// exactly one `StreamingComplete` on success. Nothing is emitted after an
    /// error.
    async fn generate(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        streaming_callback: &StreamingCallback,
    ) -> Result<(), ApiError>;
}
