//! Provider error types.

use thiserror::Error;

use crate::types::TierOutcome;

/// Errors a single provider tier can produce.
///
/// None of these leave the decision orchestrator; each one only moves the
/// chain on to the next tier.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The tier did not answer before its deadline and was abandoned.
    #[error("tier '{tier}' timed out after {after_ms}ms")]
    Timeout {
        /// Tier name.
        tier: String,
        /// Deadline that was exceeded.
        after_ms: u64,
    },

    /// Connection, DNS, TLS or body read failure.
    #[error("provider unreachable: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The reply arrived but did not validate against the decision schema.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// The tier is misconfigured (missing URL, model or key).
    #[error("provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Attempt outcome this error is recorded as.
    #[must_use]
    pub fn outcome(&self) -> TierOutcome {
        match self {
            Self::Timeout { .. } => TierOutcome::Timeout,
            Self::MalformedResponse(_) => TierOutcome::ValidationError,
            Self::Transport(_) | Self::Http { .. } | Self::Config(_) => TierOutcome::TransportError,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
