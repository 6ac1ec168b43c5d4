use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One entry of a conversation, replayed verbatim to every provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Chat message in the `{role, content}` shape shared by OpenAI and Ollama
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// History followed by the new prompt as a final user message
    pub fn conversation(history: &[ConversationTurn], prompt: &str) -> Vec<ChatMessage> {
        history
            .iter()
            .map(|turn| ChatMessage {
                role: turn.role.as_str().to_string(),
                content: turn.content.clone(),
            })
            .chain(std::iter::once(ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }))
            .collect()
    }
}

/// Common error types for all providers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid credential or URL. No request was attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The response carried no readable body
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{provider} request failed with status {status}: {message}")]
    Provider {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation cancelled")]
    Cancelled,
}
