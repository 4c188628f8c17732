//! HTTP providers for Ollama, OpenAI-compatible and Anthropic endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::provider::Provider;
use crate::types::{ProviderKind, ProviderReply, ProviderRequest, TierConfig, TokenUsage};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_ERROR_BODY: usize = 512;

/// A remote provider reached over HTTP.
pub struct HttpProvider {
    kind: ProviderKind,
    base_url: String,
    model: String,
    api_key: Option<String>,
    http: Client,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl HttpProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] for the rule kind, which has no
    /// HTTP backend, and when a cloud kind has no API key.
    pub fn new(
        kind: ProviderKind,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        match kind {
            ProviderKind::Rules => {
                return Err(ProviderError::Config("rule tier has no HTTP backend".into()));
            }
            ProviderKind::OpenAi | ProviderKind::Anthropic if api_key.is_none() => {
                return Err(ProviderError::Config(format!("{kind} tier requires an API key")));
            }
            _ => {}
        }
        let http = Client::builder()
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;
        Ok(Self {
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            http,
        })
    }

    /// Build from a `[[tiers]]` entry, reading the API key from the
    /// environment variable it names.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] when the URL, model or key is
    /// missing.
    pub fn from_config(tier: &TierConfig) -> Result<Self, ProviderError> {
        let base_url = tier
            .base_url
            .clone()
            .ok_or_else(|| ProviderError::Config(format!("tier '{}' has no base_url", tier.name)))?;
        let model = tier
            .model
            .clone()
            .ok_or_else(|| ProviderError::Config(format!("tier '{}' has no model", tier.name)))?;
        let api_key = match &tier.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                ProviderError::Config(format!("tier '{}': environment variable {var} is not set", tier.name))
            })?),
            None => None,
        };
        Self::new(tier.kind, base_url, model, api_key)
    }

    async fn complete_ollama(&self, request: &ProviderRequest) -> Result<ProviderReply, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "system": request.system,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });
        let json = self.post(self.http.post(&url).json(&body)).await?;
        let text = json["response"]
            .as_str()
            .ok_or_else(|| ProviderError::MalformedResponse("ollama reply has no 'response' field".into()))?;
        Ok(self.reply(text, reported_usage(&json["prompt_eval_count"], &json["eval_count"])))
    }

    async fn complete_openai(&self, request: &ProviderRequest) -> Result<ProviderReply, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        let mut builder = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let json = self.post(builder).await?;
        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::MalformedResponse("chat completion has no message content".into()))?;
        let usage = &json["usage"];
        Ok(self.reply(text, reported_usage(&usage["prompt_tokens"], &usage["completion_tokens"])))
    }

    async fn complete_anthropic(&self, request: &ProviderRequest) -> Result<ProviderReply, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = json!({
            "model": self.model,
            "system": request.system,
            "messages": [
                { "role": "user", "content": request.prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        let mut builder = self
            .http
            .post(&url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }
        let json = self.post(builder).await?;
        let text = json["content"][0]["text"]
            .as_str()
            .ok_or_else(|| ProviderError::MalformedResponse("message has no text content block".into()))?;
        let usage = &json["usage"];
        Ok(self.reply(text, reported_usage(&usage["input_tokens"], &usage["output_tokens"])))
    }

    async fn post(&self, builder: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            body.truncate(MAX_ERROR_BODY);
            warn!(kind = %self.kind, status = status.as_u16(), "provider returned error status");
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("reply is not JSON: {e}")))
    }

    fn reply(&self, text: &str, usage: Option<TokenUsage>) -> ProviderReply {
        debug!(
            kind = %self.kind,
            model = %self.model,
            chars = text.len(),
            prompt_tokens = usage.map(|u| u.prompt_tokens),
            completion_tokens = usage.map(|u| u.completion_tokens),
            "provider replied"
        );
        ProviderReply {
            text: text.to_string(),
            model: self.model.clone(),
            usage,
        }
    }
}

/// Token counts from a reply body, when the backend filled in both fields.
fn reported_usage(prompt: &Value, completion: &Value) -> Option<TokenUsage> {
    let count = |v: &Value| v.as_u64().map(|n| u32::try_from(n).unwrap_or(u32::MAX));
    Some(TokenUsage::reported(count(prompt)?, count(completion)?))
}

#[async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, ProviderError> {
        match self.kind {
            ProviderKind::Ollama => self.complete_ollama(request).await,
            ProviderKind::OpenAi => self.complete_openai(request).await,
            ProviderKind::Anthropic => self.complete_anthropic(request).await,
            ProviderKind::Rules => Err(ProviderError::Config("rule tier has no HTTP backend".into())),
        }
    }
}
