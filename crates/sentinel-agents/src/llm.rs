//! LLM provider abstraction with an Anthropic default and a mock for testing.
//!
//! The LLM is a capability, not control flow: agents consult it for
//! planning, summarization, and soft pattern hints. Every hard finding has
//! a deterministic, LLM-free origin in the playbook logic, so a provider
//! failure degrades quality rather than correctness.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors from LLM providers.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM response failed validation: {0}")]
    Validation(String),
}

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token accounting for a completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub stop_reason: Option<String>,
}

/// Interface to an LLM backend.
///
/// Implementations must be safe for concurrent calls.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a free-form completion for the given messages.
    async fn complete(
        &self,
        messages: &[LlmMessage],
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError>;

    /// Generate a completion constrained to the given JSON schema.
    ///
    /// Returns the parsed JSON value. Output that is not valid JSON is an
    /// [`LlmError::Validation`] the caller catches.
    async fn complete_structured(
        &self,
        messages: &[LlmMessage],
        schema: &serde_json::Value,
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<serde_json::Value, LlmError>;
}

/// Run a structured completion and deserialize the result into `T`.
pub async fn complete_typed<T: DeserializeOwned>(
    llm: &dyn LlmProvider,
    messages: &[LlmMessage],
    schema: &serde_json::Value,
    system: Option<&str>,
    max_tokens: u32,
) -> Result<T, LlmError> {
    let value = llm
        .complete_structured(messages, schema, system, max_tokens)
        .await?;
    serde_json::from_value(value).map_err(|e| LlmError::Validation(e.to_string()))
}

// ── Anthropic provider ────────────────────────────────────────────

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

/// Claude API provider using the Anthropic Messages endpoint.
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError> {
        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::Assistant => "assistant",
                        _ => "user",
                    },
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": api_messages,
        });
        if let Some(system) = system {
            body["system"] = serde_json::Value::String(system.to_string());
        }

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Transport(format!(
                "Anthropic API returned {status}: {detail}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let content = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| LlmError::Validation("response has no text content".to_string()))?
            .to_string();

        Ok(LlmResponse {
            content,
            model: body["model"].as_str().unwrap_or(&self.model).to_string(),
            usage: TokenUsage {
                input_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
                output_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
            },
            stop_reason: body["stop_reason"].as_str().map(str::to_string),
        })
    }

    async fn complete_structured(
        &self,
        messages: &[LlmMessage],
        schema: &serde_json::Value,
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<serde_json::Value, LlmError> {
        let mut augmented = messages.to_vec();
        let suffix = format!("\n\nRespond with valid JSON matching this schema:\n{schema}");
        match augmented.last_mut() {
            Some(last) => last.content.push_str(&suffix),
            None => augmented.push(LlmMessage::user(suffix)),
        }

        let response = self.complete(&augmented, system, max_tokens).await?;
        serde_json::from_str(&response.content).map_err(|e| LlmError::Validation(e.to_string()))
    }
}

// ── Mock provider ─────────────────────────────────────────────────

/// Mock provider for testing — returns pre-configured responses, cycling
/// through them by call index.
pub struct MockLlmProvider {
    responses: Vec<String>,
    call_count: AtomicUsize,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        let responses = if responses.is_empty() {
            vec!["Mock LLM response".to_string()]
        } else {
            responses
        };
        Self {
            responses,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(
        &self,
        _messages: &[LlmMessage],
        _system: Option<&str>,
        _max_tokens: u32,
    ) -> Result<LlmResponse, LlmError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst) % self.responses.len();
        Ok(LlmResponse {
            content: self.responses[idx].clone(),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            },
            stop_reason: Some("end_turn".to_string()),
        })
    }

    async fn complete_structured(
        &self,
        messages: &[LlmMessage],
        _schema: &serde_json::Value,
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<serde_json::Value, LlmError> {
        let response = self.complete(messages, system, max_tokens).await?;
        serde_json::from_str(&response.content).map_err(|e| LlmError::Validation(e.to_string()))
    }
}
