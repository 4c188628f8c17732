//! Ordered tier chain with hard per-tier deadlines.
//!
//! Tiers are tried strictly in priority order. Each attempt yields a tagged
//! [`TierOutcome`]; the chain stops at the first `Success`. A timeout,
//! transport error or validation failure moves on to the next tier exactly
//! once; there is no retry loop inside a tier.
//!
//! Deadlines are enforced with `tokio::time::timeout`. When a tier's
//! deadline passes its future is dropped, which aborts the request on our
//! side; whatever the backend sends later is never read.
//!
//! Every reply that comes back is charged to its tier: token counts as the
//! backend reported them, or estimated from text length, priced with the
//! tier's [`TierPricing`]. Malformed replies are charged too.
//!
//! Each tier also tracks its health. After more than
//! [`HealthPolicy::disable_after_errors`] consecutive failures the tier is
//! skipped (recorded as a transport-class attempt) until
//! [`HealthPolicy::reenable_after`] has passed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::client::HttpProvider;
use crate::error::ProviderError;
use crate::provider::Provider;
use crate::response::{DecisionResponse, parse_response};
use crate::types::{ProviderRequest, TierConfig, TierOutcome, TierPricing, TokenUsage};

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// When to take a failing tier out of rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Consecutive failures tolerated before the tier is disabled.
    pub disable_after_errors: u32,
    /// How long a disabled tier is skipped.
    pub reenable_after: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            disable_after_errors: 3,
            reenable_after: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default)]
struct TierHealth {
    success_count: u64,
    error_count: u64,
    consecutive_failures: u32,
    avg_latency_ms: f64,
    last_error: Option<String>,
    disabled_until: Option<Instant>,
    prompt_tokens: u64,
    completion_tokens: u64,
    cost_usd: f64,
}

impl TierHealth {
    fn is_disabled(&self, now: Instant) -> bool {
        self.disabled_until.is_some_and(|until| now < until)
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_success(&mut self, latency: Duration) {
        self.success_count += 1;
        self.consecutive_failures = 0;
        self.disabled_until = None;
        let ms = latency.as_secs_f64() * 1000.0;
        self.avg_latency_ms += (ms - self.avg_latency_ms) / self.success_count as f64;
    }

    fn record_usage(&mut self, usage: TokenUsage, cost_usd: f64) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.cost_usd += cost_usd;
    }

    fn record_failure(&mut self, error: &ProviderError, policy: HealthPolicy, now: Instant) -> bool {
        self.error_count += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.to_string());
        if self.consecutive_failures > policy.disable_after_errors {
            self.disabled_until = Some(now + policy.reenable_after);
            return true;
        }
        false
    }
}

/// Point-in-time health of one tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierHealthSnapshot {
    /// Tier name.
    pub name: String,
    /// Accepted replies.
    pub success_count: u64,
    /// Failed attempts of any kind.
    pub error_count: u64,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Mean latency of accepted replies.
    pub avg_latency_ms: f64,
    /// Most recent error text.
    pub last_error: Option<String>,
    /// Whether the tier is currently skipped.
    pub disabled: bool,
    /// Prompt tokens over every reply received.
    pub prompt_tokens: u64,
    /// Completion tokens over every reply received.
    pub completion_tokens: u64,
    /// Spend in USD.
    pub cost_usd: f64,
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Record of one tier attempt, kept whether or not it succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierAttempt {
    /// Tier name.
    pub tier: String,
    /// Time spent on the attempt.
    pub latency_ms: u64,
    /// Tagged outcome.
    pub outcome: TierOutcome,
    /// Error text for failed attempts.
    pub error: Option<String>,
    /// Tokens spent; `None` when no reply came back.
    pub usage: Option<TokenUsage>,
    /// Cost of the tokens spent, in USD.
    pub cost_usd: f64,
}

/// The reply a tier produced and the chain accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedReply {
    /// Tier name.
    pub tier: String,
    /// Raw text as returned.
    pub raw: String,
    /// Validated decision.
    pub response: DecisionResponse,
}

/// Result of running the whole chain.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainOutcome {
    /// Every attempt in order.
    pub attempts: Vec<TierAttempt>,
    /// The accepted reply, if any tier produced one.
    pub accepted: Option<AcceptedReply>,
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// A remote tier ready to be called.
pub struct ConfiguredTier {
    name: String,
    timeout: Duration,
    provider: Arc<dyn Provider>,
    sampling: Option<(u32, f32)>,
    pricing: TierPricing,
    health: Mutex<TierHealth>,
}

impl std::fmt::Debug for ConfiguredTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredTier")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

impl ConfiguredTier {
    /// Wrap any provider with a name and deadline.
    #[must_use]
    pub fn new(name: impl Into<String>, timeout: Duration, provider: Arc<dyn Provider>) -> Self {
        Self {
            name: name.into(),
            timeout,
            provider,
            sampling: None,
            pricing: TierPricing::default(),
            health: Mutex::new(TierHealth::default()),
        }
    }

    /// Charge replies from this tier at `pricing`.
    #[must_use]
    pub fn with_pricing(mut self, pricing: TierPricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Build an HTTP tier from its config entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] if the entry cannot produce a
    /// provider.
    pub fn from_config(config: &TierConfig) -> Result<Self, ProviderError> {
        let provider = HttpProvider::from_config(config)?;
        let mut tier = Self::new(config.name.clone(), config.timeout(), Arc::new(provider)).with_pricing(config.pricing);
        tier.sampling = Some((config.max_tokens, config.temperature));
        Ok(tier)
    }

    /// Tier name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deadline for one call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Ordered list of remote tiers.
#[derive(Debug, Default)]
pub struct TierChain {
    tiers: Vec<ConfiguredTier>,
    policy: HealthPolicy,
}

impl TierChain {
    /// Chain over `tiers` in the given order.
    #[must_use]
    pub fn new(tiers: Vec<ConfiguredTier>, policy: HealthPolicy) -> Self {
        Self { tiers, policy }
    }

    /// Build the remote part of a `[[tiers]]` list, skipping rule tiers.
    ///
    /// # Errors
    ///
    /// Returns the first tier's configuration error.
    pub fn from_configs(configs: &[TierConfig], policy: HealthPolicy) -> Result<Self, ProviderError> {
        let tiers = configs
            .iter()
            .filter(|c| c.kind.is_remote())
            .map(ConfiguredTier::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(tiers, policy))
    }

    /// Number of remote tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Whether only the rule tier remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Sum of all tier deadlines: the worst-case time spent in the chain.
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        self.tiers.iter().map(|t| t.timeout).sum()
    }

    /// Try each tier in order until one produces a schema-valid reply.
    #[instrument(name = "npcmind::chain", skip_all, fields(tiers = self.tiers.len()))]
    pub async fn run(&self, request: &ProviderRequest) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();

        for tier in &self.tiers {
            let started = Instant::now();
            if tier.health.lock().is_disabled(started) {
                debug!(tier = %tier.name, "skipping disabled tier");
                outcome.attempts.push(TierAttempt {
                    tier: tier.name.clone(),
                    latency_ms: 0,
                    outcome: TierOutcome::TransportError,
                    error: Some("tier disabled".into()),
                    usage: None,
                    cost_usd: 0.0,
                });
                continue;
            }

            let request = match tier.sampling {
                Some((max_tokens, temperature)) => ProviderRequest {
                    max_tokens,
                    temperature,
                    ..request.clone()
                },
                None => request.clone(),
            };

            let (result, usage) = match tokio::time::timeout(tier.timeout, tier.provider.complete(&request)).await {
                Err(_) => (
                    Err(ProviderError::Timeout {
                        tier: tier.name.clone(),
                        after_ms: millis(tier.timeout),
                    }),
                    None,
                ),
                Ok(Err(err)) => (Err(err), None),
                Ok(Ok(reply)) => {
                    let usage = reply.usage.unwrap_or_else(|| TokenUsage::estimate(&request, &reply.text));
                    (parse_response(&reply.text).map(|parsed| (reply, parsed)), Some(usage))
                }
            };
            let latency = started.elapsed();
            let cost_usd = usage.map_or(0.0, |u| tier.pricing.cost(u));
            if let Some(usage) = usage {
                tier.health.lock().record_usage(usage, cost_usd);
            }

            match result {
                Ok((reply, response)) => {
                    tier.health.lock().record_success(latency);
                    debug!(tier = %tier.name, latency_ms = millis(latency), action = %response.action, "tier accepted");
                    outcome.attempts.push(TierAttempt {
                        tier: tier.name.clone(),
                        latency_ms: millis(latency),
                        outcome: TierOutcome::Success,
                        error: None,
                        usage,
                        cost_usd,
                    });
                    outcome.accepted = Some(AcceptedReply {
                        tier: tier.name.clone(),
                        raw: reply.text,
                        response,
                    });
                    return outcome;
                }
                Err(err) => {
                    let disabled = tier.health.lock().record_failure(&err, self.policy, Instant::now());
                    warn!(
                        tier = %tier.name,
                        outcome = %err.outcome(),
                        latency_ms = millis(latency),
                        disabled,
                        error = %err,
                        "tier failed, falling through"
                    );
                    outcome.attempts.push(TierAttempt {
                        tier: tier.name.clone(),
                        latency_ms: millis(latency),
                        outcome: err.outcome(),
                        error: Some(err.to_string()),
                        usage,
                        cost_usd,
                    });
                }
            }
        }

        outcome
    }

    /// Health of every tier, in chain order.
    #[must_use]
    pub fn health(&self) -> Vec<TierHealthSnapshot> {
        let now = Instant::now();
        self.tiers
            .iter()
            .map(|t| {
                let h = t.health.lock();
                TierHealthSnapshot {
                    name: t.name.clone(),
                    success_count: h.success_count,
                    error_count: h.error_count,
                    consecutive_failures: h.consecutive_failures,
                    avg_latency_ms: h.avg_latency_ms,
                    last_error: h.last_error.clone(),
                    disabled: h.is_disabled(now),
                    prompt_tokens: h.prompt_tokens,
                    completion_tokens: h.completion_tokens,
                    cost_usd: h.cost_usd,
                }
            })
            .collect()
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
