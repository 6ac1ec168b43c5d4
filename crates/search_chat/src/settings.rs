use crate::persistence::FileStore;
use anyhow::{bail, Result};
use llm::factory::ProviderConfig;
use llm::OllamaClient;
use serde::{Deserialize, Serialize};
use web::RelayClient;

/// Key under which the settings document is stored
pub const SETTINGS_KEY: &str = "app_settings";

/// Credentials and endpoints, loaded once at startup.
///
/// Fields missing from the stored document keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub relay_url: String,
    pub gemini_api_key: String,
    pub openai_api_key: String,
    pub openrouter_api_key: String,
    pub ollama_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay_url: String::new(),
            gemini_api_key: String::new(),
            openai_api_key: String::new(),
            openrouter_api_key: String::new(),
            ollama_base_url: OllamaClient::default_base_url(),
        }
    }
}

impl Settings {
    pub const KEYS: [&'static str; 5] = [
        "relay_url",
        "gemini_api_key",
        "openai_api_key",
        "openrouter_api_key",
        "ollama_base_url",
    ];

    /// Loads the stored settings, falling back to defaults when they cannot
    /// be read.
    pub fn load(store: &FileStore) -> Self {
        match Self::try_load(store) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!("Failed to load settings: {err:#}");
                Settings::default()
            }
        }
    }

    pub fn try_load(store: &FileStore) -> Result<Self> {
        let mut settings: Settings = store.get(SETTINGS_KEY)?.unwrap_or_default();

        // Allow ${VAR} placeholders so keys can stay out of the settings file
        for key in Self::KEYS {
            if let Some(value) = settings.field_mut(key) {
                if let Some(resolved) = substitute_env_vars(value) {
                    *value = resolved;
                }
            }
        }

        Ok(settings)
    }

    pub fn save(&self, store: &FileStore) -> Result<()> {
        store.set(SETTINGS_KEY, self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "relay_url" => &self.relay_url,
            "gemini_api_key" => &self.gemini_api_key,
            "openai_api_key" => &self.openai_api_key,
            "openrouter_api_key" => &self.openrouter_api_key,
            "ollama_base_url" => &self.ollama_base_url,
            _ => return None,
        };
        Some(value)
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        let value = match key {
            "relay_url" => &mut self.relay_url,
            "gemini_api_key" => &mut self.gemini_api_key,
            "openai_api_key" => &mut self.openai_api_key,
            "openrouter_api_key" => &mut self.openrouter_api_key,
            "ollama_base_url" => &mut self.ollama_base_url,
            _ => return None,
        };
        Some(value)
    }

    /// Updates one field by name; values are trimmed like form input
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match self.field_mut(key) {
            Some(field) => {
                *field = value.trim().to_string();
                Ok(())
            }
            None => bail!(
                "Unknown setting '{key}', expected one of: {}",
                Self::KEYS.join(", ")
            ),
        }
    }

    /// Value for display, with credentials masked
    pub fn display_value(&self, key: &str) -> Option<String> {
        let value = self.get(key)?;
        if key.ends_with("_api_key") {
            Some(mask_secret(value))
        } else {
            Some(value.to_string())
        }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            gemini_api_key: self.gemini_api_key.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openrouter_api_key: self.openrouter_api_key.clone(),
            ollama_base_url: self.ollama_base_url.clone(),
            ..ProviderConfig::default()
        }
    }

    pub fn relay_client(&self) -> RelayClient {
        RelayClient::new(self.relay_url.clone())
    }
}

fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        len if len <= 8 => "*".repeat(len),
        len => {
            let tail: String = chars[len - 4..].iter().collect();
            format!("{}{}", "*".repeat(len - 4), tail)
        }
    }
}

fn substitute_env_vars(input: &str) -> Option<String> {
    let mut result = input.to_string();
    let mut changed = false;
    let mut pos = 0;
    // Substituted values are not scanned again
    while let Some(offset) = result[pos..].find("${") {
        let start = pos + offset;
        let end = start + result[start..].find('}')?;
        let var_name = &result[start + 2..end];
        let var_value = std::env::var(var_name).ok()?;
        result.replace_range(start..=end, &var_value);
        pos = start + var_value.len();
        changed = true;
    }

    if changed {
        Some(result)
    } else {
        None
    }
}
