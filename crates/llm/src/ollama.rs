use crate::streaming::{process_stream, HttpChunkStream};
use crate::{types::*, utils, ChatProvider, StreamingCallback};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "ollama";

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn default_base_url() -> String {
        "http://localhost:11434".to_string()
    }

    pub fn default_model() -> String {
        "codegemma:7b".to_string()
    }

    pub fn new(model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model,
        }
    }

    fn build_request(&self, prompt: &str, history: &[ConversationTurn]) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            messages: ChatMessage::conversation(history, prompt),
            stream: true,
        }
    }

    /// Every line is a complete JSON document carrying `message.content`.
    pub fn parse_frame(line: &str) -> Option<String> {
        let response: OllamaResponse = serde_json::from_str(line).ok()?;
        Some(
            response
                .message
                .map(|message| message.content)
                .unwrap_or_default(),
        )
    }
}

#[async_trait]
impl ChatProvider for OllamaClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        streaming_callback: &StreamingCallback,
    ) -> Result<(), ApiError> {
        let base_url = utils::require_setting(&self.base_url, "Ollama base URL")?;
        let request = self.build_request(prompt, history);

        debug!(
            "Sending request to Ollama model {} with {} messages",
            self.model,
            request.messages.len()
        );

        let response = utils::send_request(
            self.client
                .post(format!("{}/api/chat", base_url.trim_end_matches('/')))
                .json(&request),
        )
        .await?;
        let response = utils::check_response_error(PROVIDER, response).await?;

        let mut source = HttpChunkStream::new(response)?;
        process_stream(&mut source, Self::parse_frame, streaming_callback).await
    }
}
