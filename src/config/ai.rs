// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

/// Drafting backend settings (`[generation]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "anthropic" | "openai" | "disabled" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from ANTHROPIC_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Fact-check reviewer settings (`[review]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Treat missing credentials, call failures and unparsable answers as a pass.
    #[serde(default = "default_true")]
    pub fail_open: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_open: true,
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ReviewConfig {
    /// The reviewer reuses the drafting client shape with its own model and budget.
    pub fn as_generation(&self) -> GenerationConfig {
        GenerationConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            max_tokens: self.max_tokens.unwrap_or(500),
            timeout_secs: self.timeout_secs,
        }
    }
}

impl GenerationConfig {
    pub fn provider_normalized(&self) -> String {
        self.provider.trim().to_lowercase()
    }

    /// Resolve the api key. `None` when the key is "ENV" and the variable is unset/empty.
    pub fn resolve_api_key(&self) -> Option<String> {
        let raw = self.api_key.trim();
        if !raw.eq_ignore_ascii_case("env") {
            return (!raw.is_empty()).then(|| raw.to_string());
        }
        let var = match self.provider_normalized().as_str() {
            "openai" => "OPENAI_API_KEY",
            _ => "ANTHROPIC_API_KEY",
        };
        env::var(var).ok().filter(|v| !v.trim().is_empty())
    }
}
