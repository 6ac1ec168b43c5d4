use crate::{ChatProvider, GeminiClient, OllamaClient, OpenAIClient, OpenRouterClient};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifier of the active model / provider
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    #[value(name = "openai")]
    OpenAI,
    #[value(name = "openrouter")]
    OpenRouter,
    Ollama,
}

impl ProviderId {
    pub fn all() -> [ProviderId; 4] {
        [
            ProviderId::Gemini,
            ProviderId::OpenAI,
            ProviderId::OpenRouter,
            ProviderId::Ollama,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAI => "openai",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Ollama => "ollama",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "Gemini 1.5 Flash",
            ProviderId::OpenAI => "GPT-4o (OpenAI)",
            ProviderId::OpenRouter => "GPT-4o (OpenRouter)",
            ProviderId::Ollama => "CodeGemma 7B (Ollama)",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("model '{0}' not recognized")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::all()
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Credentials and endpoints used to build provider clients
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub gemini_api_key: String,
    pub openai_api_key: String,
    pub openrouter_api_key: String,
    pub ollama_base_url: String,
    pub gemini_base_url: String,
    pub openai_base_url: String,
    pub openrouter_base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            openai_api_key: String::new(),
            openrouter_api_key: String::new(),
            ollama_base_url: OllamaClient::default_base_url(),
            gemini_base_url: GeminiClient::default_base_url(),
            openai_base_url: OpenAIClient::default_base_url(),
            openrouter_base_url: OpenRouterClient::default_base_url(),
        }
    }
}

impl ProviderConfig {
    /// Client used for single-shot helper calls such as query rewriting
    pub fn gemini_client(&self) -> GeminiClient {
        GeminiClient::new(
            self.gemini_api_key.clone(),
            GeminiClient::default_model(),
            self.gemini_base_url.clone(),
        )
    }
}

pub fn create_provider(id: ProviderId, config: &ProviderConfig) -> Arc<dyn ChatProvider> {
    match id {
        ProviderId::Gemini => Arc::new(config.gemini_client()),
        ProviderId::OpenAI => Arc::new(OpenAIClient::new(
            config.openai_api_key.clone(),
            OpenAIClient::default_model(),
            config.openai_base_url.clone(),
        )),
        ProviderId::OpenRouter => Arc::new(OpenRouterClient::new(
            config.openrouter_api_key.clone(),
            OpenRouterClient::default_model(),
            config.openrouter_base_url.clone(),
        )),
        ProviderId::Ollama => Arc::new(OllamaClient::new(
            OllamaClient::default_model(),
            config.ollama_base_url.clone(),
        )),
    }
}
