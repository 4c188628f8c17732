//! Memory records and the per-agent memory store.
//!
//! A [`MemoryRecord`] has two representations: the structured payload
//! (actor, subject, valence, text) and an embedding derived from the payload
//! text. Both are owned by the [`store::MemoryStore`]; agents only ever hold
//! [`MemoryId`]s and never mutate records.

pub mod journal;
pub mod store;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, MemoryId};

pub use journal::{MemoryJournal, SqliteJournal};
pub use store::{MemoryStore, MemorySummary, WriteReceipt};

/// What a memory is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something the agent did or witnessed.
    Event,
    /// A change in how the agent feels about another agent.
    Relationship,
    /// An exchange with another agent.
    Conversation,
}

impl MemoryKind {
    /// Stable string form used by the journal.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Relationship => "relationship",
            Self::Conversation => "conversation",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(Self::Event),
            "relationship" => Ok(Self::Relationship),
            "conversation" => Ok(Self::Conversation),
            _ => Err(format!("unknown memory kind: '{s}'")),
        }
    }
}

/// Structured content of a memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPayload {
    /// Who acted.
    pub actor: String,
    /// Who or what was acted upon.
    pub subject: String,
    /// Emotional quality, -1.0 (negative) to 1.0 (positive).
    pub valence: f32,
    /// Free-text description.
    pub text: String,
}

impl MemoryPayload {
    /// Create a payload; valence is clamped to [-1, 1].
    #[must_use]
    pub fn new(
        actor: impl Into<String>,
        subject: impl Into<String>,
        valence: f32,
        text: impl Into<String>,
    ) -> Self {
        let valence = if valence.is_nan() { 0.0 } else { valence.clamp(-1.0, 1.0) };
        Self {
            actor: actor.into(),
            subject: subject.into(),
            valence,
            text: text.into(),
        }
    }

    /// Text the embedding is derived from.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.actor, self.text, self.subject)
    }
}

/// One remembered fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique id.
    pub id: MemoryId,
    /// Owning agent.
    pub agent: AgentId,
    /// Category.
    pub kind: MemoryKind,
    /// When the remembered thing happened.
    pub timestamp: DateTime<Utc>,
    /// Structured content.
    pub payload: MemoryPayload,
    /// Important records are never evicted.
    pub important: bool,
}

impl MemoryRecord {
    /// Create a non-important record with a fresh id.
    #[must_use]
    pub fn new(
        agent: AgentId,
        kind: MemoryKind,
        payload: MemoryPayload,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MemoryId::new(),
            agent,
            kind,
            timestamp,
            payload,
            important: false,
        }
    }

    /// Mark the record important (exempt from eviction).
    #[must_use]
    pub fn important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    /// One-line rendering for prompts.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("[{}] {}", self.kind, self.payload.text)
    }
}
