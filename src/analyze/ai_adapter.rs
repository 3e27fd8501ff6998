//! Generative backend abstraction: one `generate(system, user) -> text` call.
//!
//! Concrete backends: Anthropic Messages API, OpenAI Chat Completions, a disabled
//! backend (missing credentials), a fixed mock (`AI_TEST_MODE=mock`) and a
//! scripted backend for tests. Failures are always errors; an empty answer is
//! `GenerationError::EmptyResponse`, never an empty string.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::ingest::providers::USER_AGENT;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("missing credentials for {0} backend")]
    MissingCredentials(&'static str),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend returned empty text")]
    EmptyResponse,
    #[error("could not decode backend response: {0}")]
    Decode(String),
}

pub type GenerationFuture<'a> = Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;

pub trait GenerativeBackend: Send + Sync {
    fn generate<'a>(&'a self, system: &'a str, user: &'a str) -> GenerationFuture<'a>;
    /// Provider name for logs.
    fn provider_name(&self) -> &'static str;
}

pub type DynBackend = Arc<dyn GenerativeBackend>;

/// Strip code fences and wrapping quotes from model output.
pub fn clean_generated_text(s: &str) -> String {
    let mut t = s.trim();
    if let Some(rest) = t.strip_prefix("```") {
        // drop an optional language tag on the fence line
        let rest = rest.split_once('\n').map_or("", |(_, body)| body);
        t = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        t = &t[1..t.len() - 1];
    }
    t.trim().to_string()
}

fn non_empty(text: String) -> Result<String, GenerationError> {
    let cleaned = clean_generated_text(&text);
    if cleaned.is_empty() {
        Err(GenerationError::EmptyResponse)
    } else {
        Ok(cleaned)
    }
}

fn build_http(timeout_secs: u64) -> Result<reqwest::Client, GenerationError> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()?)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: String = resp.text().await.unwrap_or_default().chars().take(300).collect();
    Err(GenerationError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Factory: build a backend according to config and environment variables.
///
/// * `AI_TEST_MODE=mock` → deterministic fixed backend.
/// * provider `disabled` or no resolvable key → [`DisabledBackend`] (every call errors).
/// * otherwise the configured HTTP backend.
pub fn build_backend(cfg: &GenerationConfig) -> anyhow::Result<DynBackend> {
    if std::env::var("AI_TEST_MODE").map(|v| v == "mock").unwrap_or(false) {
        return Ok(Arc::new(FixedBackend::new(MOCK_TEXT)));
    }
    let provider = cfg.provider_normalized();
    if provider == "disabled" {
        return Ok(Arc::new(DisabledBackend));
    }
    let Some(api_key) = cfg.resolve_api_key() else {
        tracing::warn!(provider = %provider, "no api key for generative backend, drafting will fail");
        return Ok(Arc::new(DisabledBackend));
    };
    match provider.as_str() {
        "anthropic" | "claude" => Ok(Arc::new(AnthropicBackend::new(cfg, api_key)?)),
        "openai" => Ok(Arc::new(OpenAiBackend::new(cfg, api_key)?)),
        other => anyhow::bail!("unsupported generation provider: {other}"),
    }
}

const MOCK_TEXT: &str = "Acme shipped a new release today. The changelog lists updated endpoints and migration notes for existing integrations.";

// ------------------------------------------------------------
// Anthropic
// ------------------------------------------------------------

pub struct AnthropicBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(cfg: &GenerationConfig, api_key: String) -> Result<Self, GenerationError> {
        Ok(Self {
            http: build_http(cfg.timeout_secs)?,
            api_key,
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            base_url: "https://api.anthropic.com".to_string(),
        })
    }
}

impl GenerativeBackend for AnthropicBackend {
    fn generate<'a>(&'a self, system: &'a str, user: &'a str) -> GenerationFuture<'a> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                max_tokens: u32,
                system: &'a str,
                messages: Vec<Msg<'a>>,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                content: Vec<Block>,
            }
            #[derive(Deserialize)]
            struct Block {
                #[serde(rename = "type")]
                kind: String,
                #[serde(default)]
                text: Option<String>,
            }

            let req = Req {
                model: &self.model,
                max_tokens: self.max_tokens,
                system,
                messages: vec![Msg {
                    role: "user",
                    content: user,
                }],
            };
            let resp = self
                .http
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&req)
                .send()
                .await?;
            let body: Resp = check_status(resp)
                .await?
                .json()
                .await
                .map_err(|e| GenerationError::Decode(e.to_string()))?;
            let text: String = body
                .content
                .into_iter()
                .filter(|b| b.kind == "text")
                .filter_map(|b| b.text)
                .collect::<Vec<_>>()
                .join("");
            non_empty(text)
        })
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

// ------------------------------------------------------------
// OpenAI
// ------------------------------------------------------------

pub struct OpenAiBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiBackend {
    pub fn new(cfg: &GenerationConfig, api_key: String) -> Result<Self, GenerationError> {
        Ok(Self {
            http: build_http(cfg.timeout_secs)?,
            api_key,
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
        })
    }
}

impl GenerativeBackend for OpenAiBackend {
    fn generate<'a>(&'a self, system: &'a str, user: &'a str) -> GenerationFuture<'a> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: Option<String>,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: system,
                    },
                    Msg {
                        role: "user",
                        content: user,
                    },
                ],
                temperature: 0.4,
                max_tokens: self.max_tokens,
            };
            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await?;
            let body: Resp = check_status(resp)
                .await?
                .json()
                .await
                .map_err(|e| GenerationError::Decode(e.to_string()))?;
            let content = body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            non_empty(content)
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Disabled / fixed / scripted
// ------------------------------------------------------------

/// Always fails with `MissingCredentials`; used when no key is configured.
pub struct DisabledBackend;

impl GenerativeBackend for DisabledBackend {
    fn generate<'a>(&'a self, _system: &'a str, _user: &'a str) -> GenerationFuture<'a> {
        Box::pin(async { Err(GenerationError::MissingCredentials("generation")) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns the same text for every call.
#[derive(Clone)]
pub struct FixedBackend {
    text: String,
}

impl FixedBackend {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl GenerativeBackend for FixedBackend {
    fn generate<'a>(&'a self, _system: &'a str, _user: &'a str) -> GenerationFuture<'a> {
        let out = self.text.clone();
        Box::pin(async move { non_empty(out) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Replays queued answers in order and records every prompt pair.
/// Once the queue is exhausted every call returns `EmptyResponse`.
#[derive(Default)]
pub struct ScriptedBackend {
    answers: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedBackend {
    pub fn new(answers: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(texts.into_iter().map(|t| Ok(t.into())).collect())
    }

    /// (system, user) prompt pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl GenerativeBackend for ScriptedBackend {
    fn generate<'a>(&'a self, system: &'a str, user: &'a str) -> GenerationFuture<'a> {
        if let Ok(mut c) = self.calls.lock() {
            c.push((system.to_string(), user.to_string()));
        }
        let next = self
            .answers
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(Err(GenerationError::EmptyResponse));
        Box::pin(async move { next })
    }
    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}
