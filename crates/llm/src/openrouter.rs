use super::openai::OpenAIClient;
use crate::{types::*, ChatProvider, StreamingCallback};
use async_trait::async_trait;

pub struct OpenRouterClient {
    inner: OpenAIClient,
}

impl OpenRouterClient {
    pub fn default_base_url() -> String {
        "https://openrouter.ai/api/v1".to_string()
    }

    pub fn default_model() -> String {
        "openai/gpt-4o".to_string()
    }

    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            inner: OpenAIClient::for_provider("openrouter", api_key, model, base_url),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenRouterClient {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn generate(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        streaming_callback: &StreamingCallback,
    ) -> Result<(), ApiError> {
        // Delegate to inner OpenAI client since the APIs are compatible
        self.inner
            .generate(prompt, history, streaming_callback)
            .await
    }
}
