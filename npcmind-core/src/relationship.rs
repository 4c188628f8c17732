//! Directed relationship map.
//!
//! Each agent holds its own opinion of others; `A → B` and `B → A` are
//! independent values. Every update clamps to [0, 1], so no sequence of
//! deltas can leave the domain.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, clamp_unit};

/// Opinion assumed for agents never met before.
pub const DEFAULT_RELATIONSHIP: f32 = 0.5;

/// Coarse relationship band used by prompts and topic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipTier {
    /// Below 0.3.
    Unfriendly,
    /// 0.3 to 0.5 inclusive.
    Neutral,
    /// Above 0.5.
    Friendly,
    /// Above 0.7.
    CloseFriend,
}

impl RelationshipTier {
    /// Band for a raw relationship value.
    #[must_use]
    pub fn of(value: f32) -> Self {
        if value > 0.7 {
            Self::CloseFriend
        } else if value > 0.5 {
            Self::Friendly
        } else if value < 0.3 {
            Self::Unfriendly
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for RelationshipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unfriendly => "not friendly",
            Self::Neutral => "neutral",
            Self::Friendly => "friendly",
            Self::CloseFriend => "close friend",
        })
    }
}

/// One agent's opinions of the agents it has met.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationships {
    values: HashMap<AgentId, f32>,
}

impl Relationships {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opinion of `other`, or [`DEFAULT_RELATIONSHIP`] if unknown.
    #[must_use]
    pub fn get(&self, other: &AgentId) -> f32 {
        self.values.get(other).copied().unwrap_or(DEFAULT_RELATIONSHIP)
    }

    /// Band of the opinion of `other`.
    #[must_use]
    pub fn tier(&self, other: &AgentId) -> RelationshipTier {
        RelationshipTier::of(self.get(other))
    }

    /// Set an absolute value (clamped).
    pub fn set(&mut self, other: AgentId, value: f32) {
        self.values.insert(other, clamp_unit(value));
    }

    /// Apply a signed delta and return the new, clamped value.
    ///
    /// Non-finite deltas are ignored.
    pub fn adjust(&mut self, other: &AgentId, delta: f32) -> f32 {
        let current = self.get(other);
        if !delta.is_finite() {
            return current;
        }
        let next = clamp_unit(current + delta);
        self.values.insert(other.clone(), next);
        next
    }

    /// Number of agents with a recorded opinion.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no opinions are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `n` strongest opinions (by value, descending; name breaks ties).
    #[must_use]
    pub fn strongest(&self, n: usize) -> Vec<(AgentId, f32)> {
        let mut all: Vec<(AgentId, f32)> =
            self.values.iter().map(|(k, v)| (k.clone(), *v)).collect();
        all.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        all.truncate(n);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_agents_are_neutral() {
        let rel = Relationships::new();
        let b = AgentId::new("B");
        assert!((rel.get(&b) - DEFAULT_RELATIONSHIP).abs() < f32::EPSILON);
        assert_eq!(rel.tier(&b), RelationshipTier::Neutral);
    }

    #[test]
    fn extreme_deltas_clamp() {
        let mut rel = Relationships::new();
        let b = AgentId::new("B");
        assert!((rel.adjust(&b, 10.0) - 1.0).abs() < f32::EPSILON);
        assert!(rel.adjust(&b, -10.0).abs() < f32::EPSILON);
        assert!(rel.adjust(&b, f32::NAN).abs() < f32::EPSILON);
    }

    #[test]
    fn tiers_follow_bands() {
        assert_eq!(RelationshipTier::of(0.9), RelationshipTier::CloseFriend);
        assert_eq!(RelationshipTier::of(0.6), RelationshipTier::Friendly);
        assert_eq!(RelationshipTier::of(0.5), RelationshipTier::Neutral);
        assert_eq!(RelationshipTier::of(0.1), RelationshipTier::Unfriendly);
        assert_eq!(RelationshipTier::CloseFriend.to_string(), "close friend");
    }

    #[test]
    fn strongest_orders_by_value() {
        let mut rel = Relationships::new();
        rel.set(AgentId::new("B"), 0.2);
        rel.set(AgentId::new("C"), 0.9);
        rel.set(AgentId::new("D"), 0.6);
        let top = rel.strongest(2);
        assert_eq!(top[0].0, AgentId::new("C"));
        assert_eq!(top[1].0, AgentId::new("D"));
    }
}
