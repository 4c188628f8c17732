//! Core types for provider tiers, requests and replies.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backend behind a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Ollama `/api/generate`.
    Ollama,
    /// Any OpenAI-compatible `/v1/chat/completions` endpoint.
    OpenAi,
    /// Anthropic `/v1/messages`.
    Anthropic,
    /// The deterministic rule tier; never performs I/O.
    Rules,
}

impl ProviderKind {
    /// Whether this tier calls out over the network.
    #[must_use]
    pub fn is_remote(self) -> bool {
        !matches!(self, Self::Rules)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Rules => "rules",
        })
    }
}

/// One entry of the `[[tiers]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Name used in logs and decision records.
    pub name: String,
    /// Backend kind.
    pub kind: ProviderKind,
    /// Base URL, e.g. `http://localhost:11434`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model identifier.
    #[serde(default)]
    pub model: Option<String>,
    /// Hard deadline for one call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Output token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Price per thousand tokens; free unless set.
    #[serde(default)]
    pub pricing: TierPricing,
}

impl TierConfig {
    /// A rule tier entry.
    #[must_use]
    pub fn rules(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ProviderKind::Rules,
            base_url: None,
            model: None,
            timeout_ms: 0,
            api_key_env: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            pricing: TierPricing::default(),
        }
    }

    /// Deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A request to one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    /// System prompt.
    pub system: String,
    /// User prompt with the assembled agent context.
    pub prompt: String,
    /// Output token limit.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl ProviderRequest {
    /// Request with default sampling settings.
    #[must_use]
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }

    /// Copy with a tier's sampling settings applied.
    #[must_use]
    pub fn for_tier(&self, tier: &TierConfig) -> Self {
        Self {
            max_tokens: tier.max_tokens,
            temperature: tier.temperature,
            ..self.clone()
        }
    }
}

/// Raw text returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReply {
    /// Generated text, unparsed.
    pub text: String,
    /// Model that produced it.
    pub model: String,
    /// Token counts the backend reported, if it reported any.
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl ProviderReply {
    /// Reply without reported usage.
    #[must_use]
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            usage: None,
        }
    }

    /// Attach the backend's token counts.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

// ---------------------------------------------------------------------------
// Token accounting
// ---------------------------------------------------------------------------

/// Rough characters per token for English text.
const CHARS_PER_TOKEN: usize = 4;

/// Token counts of one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens sent: system and user prompt.
    pub prompt_tokens: u32,
    /// Tokens generated.
    pub completion_tokens: u32,
    /// Counted from text length rather than reported by the backend.
    #[serde(default)]
    pub estimated: bool,
}

impl TokenUsage {
    /// Counts reported by a backend.
    #[must_use]
    pub fn reported(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            estimated: false,
        }
    }

    /// Estimate from text length when the backend reports nothing.
    #[must_use]
    pub fn estimate(request: &ProviderRequest, completion: &str) -> Self {
        Self {
            prompt_tokens: estimate_tokens(&request.system).saturating_add(estimate_tokens(&request.prompt)),
            completion_tokens: estimate_tokens(completion),
            estimated: true,
        }
    }

    /// Prompt plus completion tokens.
    #[must_use]
    pub fn total(self) -> u64 {
        u64::from(self.prompt_tokens) + u64::from(self.completion_tokens)
    }
}

/// About one token per four characters; any non-empty text is at least one.
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    u32::try_from((text.chars().count() / CHARS_PER_TOKEN).max(1)).unwrap_or(u32::MAX)
}

/// What a tier charges, in USD per thousand tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierPricing {
    /// Price of a thousand prompt tokens.
    #[serde(default)]
    pub prompt_per_1k: f64,
    /// Price of a thousand completion tokens.
    #[serde(default)]
    pub completion_per_1k: f64,
}

impl TierPricing {
    /// Cost of one call.
    #[must_use]
    pub fn cost(&self, usage: TokenUsage) -> f64 {
        f64::from(usage.prompt_tokens) / 1000.0 * self.prompt_per_1k
            + f64::from(usage.completion_tokens) / 1000.0 * self.completion_per_1k
    }
}

/// Tagged result of one tier attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierOutcome {
    /// The reply validated and was accepted.
    Success,
    /// Abandoned at the deadline.
    Timeout,
    /// Unreachable, errored, or skipped while disabled.
    TransportError,
    /// Reply failed schema validation.
    ValidationError,
}

impl fmt::Display for TierOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::TransportError => "transport_error",
            Self::ValidationError => "validation_error",
        })
    }
}

fn default_timeout_ms() -> u64 { 5_000 }
fn default_max_tokens() -> u32 { 150 }
fn default_temperature() -> f32 { 0.7 }
