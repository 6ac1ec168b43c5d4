use llm::ApiError;
use web::RelayError;

/// Terminal failure of one send attempt
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Missing or invalid credential, URL or model identifier
    #[error("Configuration error: {0}")]
    Config(String),

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

    /// Relay failure outside of the search stage
    #[error("Relay error: {0}")]
    Relay(RelayError),

    /// Relay failure while fetching search results; aborts the send
    #[error("Search failed: {0}")]
    Search(RelayError),

    /// The generation task ended abnormally
    #[error("Generation task failed: {0}")]
    Task(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl From<ApiError> for ChatError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Config(message) => ChatError::Config(message),
            ApiError::Protocol(message) => ChatError::Protocol(message),
            ApiError::Provider {
                provider,
                status,
                message,
            } => ChatError::Provider {
                provider,
                status,
                message,
            },
            ApiError::Network(message) => ChatError::Network(message),
            ApiError::Cancelled => ChatError::Cancelled,
        }
    }
}

impl From<RelayError> for ChatError {
    fn from(err: RelayError) -> Self {
        ChatError::Relay(err)
    }
}
