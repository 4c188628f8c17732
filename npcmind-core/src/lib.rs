//! # npcmind core
//!
//! Per-agent state and memory for the npcmind decision engine. Nothing in
//! this crate performs network I/O; it is the deterministic half of the
//! system that the engine crate drives.
//!
//! - [`personality`]: immutable ten-trait personality vectors
//! - [`emotion`]: decaying emotion vectors and pairwise contagion
//! - [`relationship`]: directed, clamped opinions of other agents
//! - [`memory`]: per-agent memory store with retention caps, embedding
//!   retrieval and an optional SQLite journal
//! - [`behavior`]: behavior state machine with learned transition weights
//! - [`topic`]: conversation topic selection over a transition graph
//! - [`metrics`]: lock-free counters and latency tracking
//!
//! ## Concurrency
//!
//! The [`MemoryStore`] is shared between agent workers: reads run
//! concurrently, writes are serialized per agent and independent across
//! agents. Everything else is plain data owned by one agent.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod behavior;
pub mod config;
pub mod embedding;
pub mod emotion;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod personality;
pub mod relationship;
pub mod retrieval;
pub mod topic;
pub mod types;

pub use behavior::{BehaviorPlanner, BehaviorState, Transition};
pub use config::{CoreConfig, RetentionTier};
pub use embedding::{EmbeddingProvider, HashingEmbedder};
pub use emotion::{Emotion, EmotionVector, Stimulus};
pub use error::{CoreError, Result};
pub use memory::{MemoryJournal, MemoryKind, MemoryPayload, MemoryRecord, MemoryStore, SqliteJournal};
pub use metrics::{CounterSnapshot, EngineCounters};
pub use personality::{Trait, TraitVector};
pub use relationship::{RelationshipTier, Relationships};
pub use retrieval::{RetrievalQuery, ScoredMemory};
pub use topic::{Topic, TopicManager};
pub use types::*;
