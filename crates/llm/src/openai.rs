use crate::streaming::{process_stream, sse_data, HttpChunkStream};
use crate::{types::*, utils, ChatProvider, StreamingCallback};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: Option<OpenAIDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any endpoint speaking the OpenAI chat-completions streaming protocol
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    provider: &'static str,
}

impl OpenAIClient {
    pub fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    pub fn default_model() -> String {
        "gpt-4o".to_string()
    }

    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self::for_provider("openai", api_key, model, base_url)
    }

    /// Client for an OpenAI-compatible provider, reported under `provider`
    pub fn for_provider(
        provider: &'static str,
        api_key: String,
        model: String,
        base_url: String,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url,
            provider,
        }
    }

    fn get_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(&self, prompt: &str, history: &[ConversationTurn]) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: ChatMessage::conversation(history, prompt),
            stream: true,
        }
    }

    /// Extracts `choices[0].delta.content`. The `[DONE]` sentinel and frames
    /// without content yield nothing.
    pub fn parse_frame(line: &str) -> Option<String> {
        let data = sse_data(line)?;
        if data.trim() == "[DONE]" {
            return None;
        }
        let response: OpenAIStreamResponse = serde_json::from_str(data).ok()?;
        Some(
            response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .unwrap_or_default(),
        )
    }
}

#[async_trait]
impl ChatProvider for OpenAIClient {
    fn name(&self) -> &'static str {
        self.provider
    }

    async fn generate(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        streaming_callback: &StreamingCallback,
    ) -> Result<(), ApiError> {
        let api_key = utils::require_setting(
            &self.api_key,
            &format!("API key for {}", self.provider),
        )?;
        let request = self.build_request(prompt, history);

        debug!(
            "Sending streaming request to {} ({}) with {} messages",
            self.provider,
            self.model,
            request.messages.len()
        );

        let response = utils::send_request(
            self.client
                .post(self.get_url())
                .header("Authorization", format!("Bearer {api_key}"))
                .header("Content-Type", "application/json")
                .json(&request),
        )
        .await?;
        let response = utils::check_response_error(self.provider, response).await?;

        let mut source = HttpChunkStream::new(response)?;
        process_stream(&mut source, Self::parse_frame, streaming_callback).await
    }
}
