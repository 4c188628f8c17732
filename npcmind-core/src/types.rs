//! Core type definitions shared by every npcmind subsystem.
//!
//! All types are serializable so that agent snapshots can be handed to
//! loggers and journals without conversion.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Identifier of a simulated agent.
///
/// Agents are addressed by their in-world name, which is also what the
/// inference providers see and answer with (e.g. `"target": "B"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// Create an agent id from a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Unique identifier for a memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random memory ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A 2D position in the simulated world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

impl Position {
    /// Create a position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Needs
// ---------------------------------------------------------------------------

/// Physiological and social needs, each a satisfaction level in [0, 1].
///
/// `1.0` means fully satisfied, values below `0.3` are urgent. The
/// simulation tick owns these values; the engine only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    /// Satiety.
    pub hunger: f32,
    /// Restedness.
    pub sleep: f32,
    /// Social contact.
    pub social: f32,
    /// Entertainment.
    pub fun: f32,
}

impl Needs {
    /// Threshold below which a need is considered urgent.
    pub const URGENT: f32 = 0.3;

    /// Create a needs vector, clamping every component to [0, 1].
    #[must_use]
    pub fn new(hunger: f32, sleep: f32, social: f32, fun: f32) -> Self {
        Self {
            hunger: clamp_unit(hunger),
            sleep: clamp_unit(sleep),
            social: clamp_unit(social),
            fun: clamp_unit(fun),
        }
    }

    /// Components as `(name, value)` pairs in a fixed order.
    #[must_use]
    pub fn components(&self) -> [(&'static str, f32); 4] {
        [
            ("hunger", self.hunger),
            ("sleep", self.sleep),
            ("social", self.social),
            ("fun", self.fun),
        ]
    }
}

impl Default for Needs {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Embedding Vector
// ---------------------------------------------------------------------------

/// A dense vector embedding used for semantic similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    /// Cosine similarity between two embeddings.
    ///
    /// Returns 0.0 on dimension mismatch or if either vector is zero.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return 0.0;
        }
        let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }
        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom < f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    /// Dimensionality of the embedding.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }
}

// ---------------------------------------------------------------------------
// Retrieval Score
// ---------------------------------------------------------------------------

/// Recency-weighted similarity used to rank retrieved memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RetrievalScore(pub OrderedFloat<f32>);

impl RetrievalScore {
    /// Create a retrieval score from a raw f32.
    #[must_use]
    pub fn new(score: f32) -> Self {
        Self(OrderedFloat(score))
    }

    /// Get the raw score value.
    #[must_use]
    pub fn value(self) -> f32 {
        self.0.into_inner()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clamp to [0, 1], mapping NaN to 0.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_are_clamped() {
        let needs = Needs::new(1.7, -0.2, f32::NAN, 0.4);
        assert!((needs.hunger - 1.0).abs() < f32::EPSILON);
        assert!(needs.sleep.abs() < f32::EPSILON);
        assert!(needs.social.abs() < f32::EPSILON, "NaN should clamp to 0");
        assert!((needs.fun - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_identical_and_orthogonal() {
        let a = Embedding(vec![1.0, 0.0]);
        let b = Embedding(vec![0.0, 1.0]);
        assert!((a.cosine_similarity(&a) - 1.0).abs() < 1e-6);
        assert!(a.cosine_similarity(&b).abs() < 1e-6);
        assert!(a.cosine_similarity(&Embedding(vec![1.0])).abs() < f32::EPSILON);
    }

    #[test]
    fn position_distance() {
        let d = Position::new(0.0, 0.0).distance(&Position::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn agent_id_displays_name() {
        assert_eq!(AgentId::new("Mira").to_string(), "Mira");
    }
}
