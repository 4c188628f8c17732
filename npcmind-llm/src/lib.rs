//! # npcmind-llm
//!
//! Inference provider layer for npcmind. Turns an assembled agent context
//! into a validated decision by walking an ordered chain of tiers:
//!
//! ```text
//! local model (Ollama)  ->  cloud (OpenAI-compatible / Anthropic)  ->  rule tier
//!    deadline each            deadline each                            no I/O
//! ```
//!
//! This crate covers the remote tiers. The deterministic rule tier needs
//! agent state and lives with the orchestrator, which runs it whenever
//! [`TierChain::run`] returns no accepted reply.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chain;
pub mod client;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod response;
pub mod types;

pub use chain::{ChainOutcome, ConfiguredTier, HealthPolicy, TierAttempt, TierChain};
pub use client::HttpProvider;
pub use error::ProviderError;
pub use provider::Provider;
pub use response::{Action, DecisionResponse, EmotionLabel, parse_response};
pub use types::{ProviderKind, ProviderReply, ProviderRequest, TierConfig, TierOutcome, TierPricing, TokenUsage};
