//! # npcmind-engine: Decision Orchestrator
//!
//! Turns an agent's state into a decision through an ordered chain of
//! inference tiers, then feeds the result back into that state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            simulation loop (caller)           │
//! │   needs, positions, nearby lists, events      │
//! └──────────────┬───────────────────────────────┘
//!                │ spawn_due / decide_if_due / contagion_tick
//!                ▼
//! ┌──────────────────────────────────────────────┐
//! │              npcmind-engine                   │
//! │  pacing ─► fingerprint ─► coalescing cache    │
//! │                     │                         │
//! │                     ▼                         │
//! │   ┌──────────────────────┐  ┌──────────────┐  │
//! │   │ npcmind-llm tiers    │─►│  rule tier   │  │
//! │   └──────────────────────┘  └──────────────┘  │
//! │                     │                         │
//! │                     ▼                         │
//! │   ┌──────────────────────────────────────┐    │
//! │   │ npcmind-core: emotion, planner,      │    │
//! │   │ memory store, topics, relationships  │    │
//! │   └──────────────────────────────────────┘    │
//! │                     │                         │
//! │                     ▼                         │
//! │            InteractionLogger                  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `orchestrator`: [`Engine`], decision cycles, outcome learning, contagion
//! - `cache`: TTL cache with per-fingerprint coalescing
//! - `context`: surroundings and state fingerprints
//! - `rules`: deterministic final tier
//! - `pacing`: one cycle in flight per agent, randomized cooldowns
//! - `logger`: interaction logger interface and sinks
//! - `config`: `npcmind.toml` and startup validation
//! - `telemetry`: tracing subscriber setup

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod orchestrator;
pub mod pacing;
pub mod rules;
pub mod telemetry;

pub use agent::{AgentHandle, AgentProfile, AgentState};
pub use config::EngineConfig;
pub use context::{DecisionContext, Fingerprint, NearbyAgent};
pub use error::{EngineError, Result};
pub use logger::{DecisionRecord, InteractionLogger, JsonlInteractionLogger, MemoryInteractionLogger};
pub use orchestrator::{Decision, Engine};
