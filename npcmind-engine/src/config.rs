//! Engine configuration.
//!
//! One TOML file (`npcmind.toml`) drives the whole engine. Every field has
//! a serde default, so a file only needs the sections it changes; the
//! default configuration is a valid rules-only engine.
//!
//! [`EngineConfig::validate`] is the startup gate: anything that would
//! make a decision cycle unable to terminate is rejected here, never at
//! decision time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use npcmind_core::CoreConfig;
use npcmind_llm::chain::HealthPolicy;
use npcmind_llm::{ProviderKind, TierConfig};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Longest cooldown between two decisions of one agent: a simulated day.
pub const MAX_COOLDOWN_SECS: f32 = 86_400.0;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Logging and RNG seed.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Decision cadence, cache and worker pool.
    #[serde(default)]
    pub decision: DecisionConfig,
    /// When failing tiers are taken out of rotation.
    #[serde(default)]
    pub health: HealthConfig,
    /// Provider tiers in priority order. The last one must be `rules`.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
    /// Memory, emotion, behavior and topic sections.
    #[serde(flatten)]
    pub core: CoreConfig,
    /// Prompt template override.
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Where decision records go.
    #[serde(default)]
    pub interaction_log: InteractionLogConfig,
}

impl EngineConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    /// Returns [`EngineError::Misconfigured`] if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| EngineError::Misconfigured(e.to_string()))
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    /// Returns [`EngineError::Io`] if the file cannot be read and
    /// [`EngineError::Misconfigured`] if it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| EngineError::Misconfigured(format!("{}: {e}", path.display())))
    }

    /// Reject configurations that cannot produce a working engine.
    ///
    /// # Errors
    /// Returns [`EngineError::Misconfigured`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        self.validate_tiers()?;

        let d = &self.decision;
        for (field, secs) in [
            ("decision.cooldown_min_secs", d.cooldown_min_secs),
            ("decision.cooldown_max_secs", d.cooldown_max_secs),
        ] {
            if !(secs.is_finite() && secs > 0.0 && secs <= MAX_COOLDOWN_SECS) {
                return Err(misconfigured(format!(
                    "{field} must be positive and at most {MAX_COOLDOWN_SECS} seconds, got {secs}"
                )));
            }
        }
        if d.cooldown_min_secs > d.cooldown_max_secs {
            return Err(misconfigured(
                "decision.cooldown_min_secs must not exceed decision.cooldown_max_secs",
            ));
        }
        if d.max_concurrent_agents == 0 {
            return Err(misconfigured("decision.max_concurrent_agents must be at least 1"));
        }
        if d.cache_capacity == 0 {
            return Err(misconfigured("decision.cache_capacity must be at least 1"));
        }
        if d.state_buckets == 0 {
            return Err(misconfigured("decision.state_buckets must be at least 1"));
        }

        self.core
            .validate()
            .map_err(|e| EngineError::Misconfigured(e.to_string()))?;

        if self.interaction_log.sink == LogSink::Jsonl && self.interaction_log.directory.as_os_str().is_empty() {
            return Err(misconfigured("interaction_log.directory is required for the jsonl sink"));
        }
        Ok(())
    }

    fn validate_tiers(&self) -> Result<()> {
        let Some(last) = self.tiers.last() else {
            return Err(misconfigured("no tiers configured; a final `rules` tier is required"));
        };
        if last.kind != ProviderKind::Rules {
            return Err(misconfigured(format!(
                "the last tier must be `rules`, found `{}` ({})",
                last.name, last.kind
            )));
        }
        let rules = self.tiers.iter().filter(|t| t.kind == ProviderKind::Rules).count();
        if rules > 1 {
            return Err(misconfigured("only one `rules` tier may be configured"));
        }

        for tier in self.tiers.iter().filter(|t| t.kind.is_remote()) {
            if tier.timeout_ms == 0 {
                return Err(misconfigured(format!("tier `{}` needs a non-zero timeout_ms", tier.name)));
            }
            if tier.base_url.as_deref().is_none_or(str::is_empty) {
                return Err(misconfigured(format!("tier `{}` needs a base_url", tier.name)));
            }
            if tier.model.as_deref().is_none_or(str::is_empty) {
                return Err(misconfigured(format!("tier `{}` needs a model", tier.name)));
            }
            let price = [tier.pricing.prompt_per_1k, tier.pricing.completion_per_1k];
            if !price.iter().all(|p| p.is_finite() && *p >= 0.0) {
                return Err(misconfigured(format!(
                    "tier `{}`: pricing must be finite and non-negative",
                    tier.name
                )));
            }
            if matches!(tier.kind, ProviderKind::OpenAi | ProviderKind::Anthropic) {
                let Some(var) = tier.api_key_env.as_deref() else {
                    return Err(misconfigured(format!("tier `{}` needs api_key_env", tier.name)));
                };
                if !std::env::var(var).is_ok_and(|v| !v.is_empty()) {
                    return Err(misconfigured(format!(
                        "tier `{}`: environment variable {var} is not set",
                        tier.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Health policy for the remote tiers.
    #[must_use]
    pub fn health_policy(&self) -> HealthPolicy {
        HealthPolicy {
            disable_after_errors: self.health.disable_after_errors,
            reenable_after: Duration::from_secs(self.health.reenable_after_secs),
        }
    }

    /// Name of the final rule tier, as recorded in decision records.
    #[must_use]
    pub fn rule_tier_name(&self) -> &str {
        self.tiers
            .iter()
            .find(|t| t.kind == ProviderKind::Rules)
            .map_or("rules", |t| t.name.as_str())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            decision: DecisionConfig::default(),
            health: HealthConfig::default(),
            tiers: default_tiers(),
            core: CoreConfig::default(),
            prompt: PromptConfig::default(),
            interaction_log: InteractionLogConfig::default(),
        }
    }
}

fn misconfigured(message: impl Into<String>) -> EngineError {
    EngineError::Misconfigured(message.into())
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, coloured.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// `[general]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Formatter.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Fixed seed for the engine RNG. Unset means entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            seed: None,
        }
    }
}

/// `[decision]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Shortest interval between an agent's decisions.
    #[serde(default = "default_cooldown_min")]
    pub cooldown_min_secs: f32,
    /// Longest interval between an agent's decisions.
    #[serde(default = "default_cooldown_max")]
    pub cooldown_max_secs: f32,
    /// How long a cached decision stays valid.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Maximum cached fingerprints.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Worker pool size for concurrent decision cycles.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_agents: usize,
    /// Buckets per unit interval when discretizing state for fingerprints.
    #[serde(default = "default_state_buckets")]
    pub state_buckets: u32,
}

impl DecisionConfig {
    /// Cache time-to-live.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            cooldown_min_secs: default_cooldown_min(),
            cooldown_max_secs: default_cooldown_max(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            max_concurrent_agents: default_max_concurrent(),
            state_buckets: default_state_buckets(),
        }
    }
}

/// `[health]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures tolerated before a tier is skipped.
    #[serde(default = "default_disable_after")]
    pub disable_after_errors: u32,
    /// Seconds a disabled tier stays out of rotation.
    #[serde(default = "default_reenable_after")]
    pub reenable_after_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            disable_after_errors: default_disable_after(),
            reenable_after_secs: default_reenable_after(),
        }
    }
}

/// `[prompt]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// TOML file replacing the built-in decision template.
    #[serde(default)]
    pub template_path: Option<PathBuf>,
}

/// Where decision records are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSink {
    /// One JSONL file per session.
    Jsonl,
    /// `tracing` events at INFO.
    Tracing,
    /// Discard.
    None,
}

/// `[interaction_log]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionLogConfig {
    /// Sink kind.
    #[serde(default = "default_sink")]
    pub sink: LogSink,
    /// Directory for session files.
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
}

impl Default for InteractionLogConfig {
    fn default() -> Self {
        Self {
            sink: default_sink(),
            directory: default_log_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_tiers() -> Vec<TierConfig> { vec![TierConfig::rules("rules")] }
fn default_log_level() -> String { "info".into() }
fn default_log_format() -> LogFormat { LogFormat::Pretty }
fn default_cooldown_min() -> f32 { 10.0 }
fn default_cooldown_max() -> f32 { 20.0 }
fn default_cache_ttl() -> u64 { 300 }
fn default_cache_capacity() -> usize { 1000 }
fn default_max_concurrent() -> usize { 32 }
fn default_state_buckets() -> u32 { 4 }
fn default_disable_after() -> u32 { 3 }
fn default_reenable_after() -> u64 { 60 }
fn default_sink() -> LogSink { LogSink::Tracing }
fn default_log_dir() -> PathBuf { PathBuf::from("logs") }

#[cfg(test)]
mod tests {
    use super::*;
    use npcmind_llm::TierPricing;

    fn remote(name: &str) -> TierConfig {
        TierConfig {
            name: name.into(),
            kind: ProviderKind::Ollama,
            base_url: Some("http://localhost:11434".into()),
            model: Some("llama3.2".into()),
            timeout_ms: 1_000,
            api_key_env: None,
            max_tokens: 150,
            temperature: 0.7,
            pricing: TierPricing::default(),
        }
    }

    #[test]
    fn default_is_valid_rules_only() {
        let config = EngineConfig::default();
        config.validate().expect("default config is valid");
        assert_eq!(config.tiers.len(), 1);
        assert_eq!(config.rule_tier_name(), "rules");
    }

    #[test]
    fn parses_full_file() {
        let config = EngineConfig::from_toml(
            r#"
            [general]
            log_level = "debug"
            log_format = "json"
            seed = 7

            [decision]
            cooldown_min_secs = 5.0
            cooldown_max_secs = 8.0
            cache_ttl_secs = 60

            [[tiers]]
            name = "local"
            kind = "ollama"
            base_url = "http://localhost:11434"
            model = "llama3.2"
            timeout_ms = 1000

            [[tiers]]
            name = "fallback"
            kind = "rules"

            [memory]
            retention = "low"
            retrieval_k = 3

            [behavior]
            learning_rate = 0.2

            [interaction_log]
            sink = "none"
            "#,
        )
        .expect("parse");
        config.validate().expect("valid");
        assert_eq!(config.general.log_format, LogFormat::Json);
        assert_eq!(config.general.seed, Some(7));
        assert_eq!(config.tiers.len(), 2);
        assert_eq!(config.core.memory.retrieval_k, 3);
        assert!((config.core.behavior.learning_rate - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.decision.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.rule_tier_name(), "fallback");
        assert_eq!(config.interaction_log.sink, LogSink::None);
    }

    #[test]
    fn missing_rules_tier_is_rejected() {
        let mut config = EngineConfig::default();
        config.tiers = vec![remote("local")];
        assert!(matches!(config.validate(), Err(EngineError::Misconfigured(_))));

        config.tiers.clear();
        assert!(matches!(config.validate(), Err(EngineError::Misconfigured(_))));
    }

    #[test]
    fn rules_tier_must_be_last_and_unique() {
        let mut config = EngineConfig::default();
        config.tiers = vec![TierConfig::rules("a"), remote("local")];
        assert!(config.validate().is_err());
        config.tiers = vec![TierConfig::rules("a"), TierConfig::rules("b")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn remote_tier_fields_are_checked() {
        let mut config = EngineConfig::default();
        let mut tier = remote("local");
        tier.timeout_ms = 0;
        config.tiers = vec![tier, TierConfig::rules("rules")];
        assert!(config.validate().is_err());

        let mut tier = remote("local");
        tier.model = None;
        config.tiers = vec![tier, TierConfig::rules("rules")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn tier_pricing_must_be_a_real_price() {
        let mut config = EngineConfig::default();
        for (prompt, completion) in [(-0.01, 0.0), (0.0, f64::NAN), (f64::INFINITY, 0.0)] {
            let mut tier = remote("local");
            tier.pricing = TierPricing {
                prompt_per_1k: prompt,
                completion_per_1k: completion,
            };
            config.tiers = vec![tier, TierConfig::rules("rules")];
            let err = config.validate().expect_err("bad price");
            assert!(err.to_string().contains("pricing"));
        }

        let mut tier = remote("local");
        tier.pricing = TierPricing {
            prompt_per_1k: 0.0015,
            completion_per_1k: 0.002,
        };
        config.tiers = vec![tier, TierConfig::rules("rules")];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cloud_tier_requires_key_variable() {
        let mut config = EngineConfig::default();
        let mut tier = remote("cloud");
        tier.kind = ProviderKind::Anthropic;
        tier.api_key_env = Some("NPCMIND_TEST_KEY_THAT_IS_NEVER_SET".into());
        config.tiers = vec![tier, TierConfig::rules("rules")];
        let err = config.validate().expect_err("missing key");
        assert!(err.to_string().contains("NPCMIND_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn decision_ranges_are_checked() {
        let mut config = EngineConfig::default();
        config.decision.cooldown_min_secs = 30.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.decision.cooldown_min_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.decision.max_concurrent_agents = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.core.behavior.learning_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.core.memory.retrieval_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unrepresentable_cooldowns_are_rejected() {
        for bad in [f32::INFINITY, f32::NAN, MAX_COOLDOWN_SECS * 2.0, 1e30] {
            let mut config = EngineConfig::default();
            config.decision.cooldown_max_secs = bad;
            let err = config.validate().expect_err("bad cooldown_max");
            assert!(err.to_string().contains("cooldown_max_secs"), "{err}");

            let mut config = EngineConfig::default();
            config.decision.cooldown_min_secs = bad;
            assert!(config.validate().is_err(), "cooldown_min {bad}");
        }

        let mut config = EngineConfig::default();
        config.core.emotion.decay_time_constant_secs = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn health_policy_maps_seconds() {
        let mut config = EngineConfig::default();
        config.health.reenable_after_secs = 5;
        assert_eq!(config.health_policy().reenable_after, Duration::from_secs(5));
    }
}
