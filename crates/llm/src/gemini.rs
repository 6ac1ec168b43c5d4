use crate::streaming::{process_stream, sse_data, HttpChunkStream};
use crate::{types::*, utils, ChatProvider, StreamingCallback};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "gemini";

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiMessage>,
}

#[derive(Debug, Serialize)]
struct GeminiMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiResponse {
    /// Text of the first part of the first candidate
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .next()?
            .text
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }

    pub fn default_model() -> String {
        "gemini-1.5-flash-latest".to_string()
    }

    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    fn get_url(&self, streaming: bool) -> String {
        if streaming {
            format!(
                "{}/models/{}:streamGenerateContent",
                self.base_url, self.model
            )
        } else {
            format!("{}/models/{}:generateContent", self.base_url, self.model)
        }
    }

    fn convert_turn(turn: &ConversationTurn) -> GeminiMessage {
        let role = match turn.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "model",
        };
        GeminiMessage {
            role: Some(role.to_string()),
            parts: vec![GeminiPart {
                text: Some(turn.content.clone()),
            }],
        }
    }

    fn build_request(prompt: &str, history: &[ConversationTurn]) -> GeminiRequest {
        let mut contents: Vec<GeminiMessage> = history.iter().map(Self::convert_turn).collect();
        contents.push(GeminiMessage {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: Some(prompt.to_string()),
            }],
        });
        GeminiRequest { contents }
    }

    /// Extracts the delta from one SSE frame. Malformed and keep-alive frames
    /// yield nothing.
    pub fn parse_frame(line: &str) -> Option<String> {
        let data = sse_data(line)?;
        serde_json::from_str::<GeminiResponse>(data)
            .ok()?
            .first_text()
    }

    /// Single-shot, non-streaming request with one role-less user content.
    pub async fn generate_once(&self, prompt: &str) -> Result<String, ApiError> {
        let api_key = utils::require_setting(&self.api_key, "Gemini API key")?;

        let request = GeminiRequest {
            contents: vec![GeminiMessage {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        debug!("Sending single-shot request to Gemini model {}", self.model);

        let response = utils::send_request(
            self.client
                .post(self.get_url(false))
                .query(&[("key", api_key)])
                .header("Content-Type", "application/json")
                .json(&request),
        )
        .await?;
        let response = utils::check_response_error(PROVIDER, response).await?;

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Protocol(format!("Failed to parse Gemini response: {e}")))?;

        body.first_text()
            .ok_or_else(|| ApiError::Protocol("Gemini response contained no text".to_string()))
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        streaming_callback: &StreamingCallback,
    ) -> Result<(), ApiError> {
        let api_key = utils::require_setting(&self.api_key, "Gemini API key")?;
        let request = Self::build_request(prompt, history);

        debug!(
            "Sending streaming request to Gemini with {} contents",
            request.contents.len()
        );

        let response = utils::send_request(
            self.client
                .post(self.get_url(true))
                .query(&[("key", api_key), ("alt", "sse")])
                .header("Content-Type", "application/json")
                .json(&request),
        )
        .await?;
        let response = utils::check_response_error(PROVIDER, response).await?;

        let mut source = HttpChunkStream::new(response)?;
        process_stream(&mut source, Self::parse_frame, streaming_callback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_assistant_turns_to_model_role() {
        let history = vec![
            ConversationTurn::user("Hola"),
            ConversationTurn::assistant("¿Qué tal?"),
        ];
        let request = GeminiClient::build_request("Bien", &history);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Hola"}]},
                    {"role": "model", "parts": [{"text": "¿Qué tal?"}]},
                    {"role": "user", "parts": [{"text": "Bien"}]},
                ]
            })
        );
    }

    #[test]
    fn parses_first_candidate_text() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Ulán"},{"text":"x"}],"role":"model"}},{"content":{"parts":[{"text":"y"}]}}]}"#;
        assert_eq!(GeminiClient::parse_frame(line), Some("Ulán".to_string()));
    }

    #[test]
    fn ignores_frames_without_prefix_or_content() {
        assert_eq!(GeminiClient::parse_frame(r#"{"candidates":[]}"#), None);
        assert_eq!(GeminiClient::parse_frame("data: not json"), None);
        assert_eq!(GeminiClient::parse_frame(r#"data: {"candidates":[]}"#), None);
        assert_eq!(
            GeminiClient::parse_frame(r#"data: {"usageMetadata":{"promptTokenCount":3}}"#),
            None
        );
    }
}
