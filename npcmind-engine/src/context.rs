//! Decision context and state fingerprints.
//!
//! A [`Fingerprint`] is a SHA-256 over the agent's discretized state plus
//! its surroundings. Continuous values (traits, emotion, needs) are
//! bucketed first, so tiny drifts between ticks map to the same key and
//! the decision cache is not fragmented.
//!
//! The agent id is part of the hash: two agents in identical states still
//! get separate cache entries, since a decision names concrete targets
//! from the agent's own point of view.

use std::fmt;

use chrono::{DateTime, Utc};
use npcmind_core::{AgentId, BehaviorState, Emotion, Needs};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::agent::AgentState;

/// Another agent within sight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyAgent {
    /// Who.
    pub id: AgentId,
    /// How far away.
    pub distance: f32,
}

impl NearbyAgent {
    /// Nearby agent at `distance`.
    #[must_use]
    pub fn new(id: impl Into<AgentId>, distance: f32) -> Self {
        Self {
            id: id.into(),
            distance,
        }
    }
}

/// What the simulation tells the engine about an agent's surroundings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContext {
    /// Agents within sight, any order.
    pub nearby: Vec<NearbyAgent>,
    /// Active world events.
    pub events: Vec<String>,
    /// Free-text description of where the agent is.
    pub situation: String,
    /// Simulation time of the cycle.
    pub now: DateTime<Utc>,
}

impl DecisionContext {
    /// Empty surroundings at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            nearby: Vec::new(),
            events: Vec::new(),
            situation: String::new(),
            now,
        }
    }

    /// Add a nearby agent.
    #[must_use]
    pub fn with_nearby(mut self, id: impl Into<AgentId>, distance: f32) -> Self {
        self.nearby.push(NearbyAgent::new(id, distance));
        self
    }

    /// Add an active event.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    /// Set the situation text.
    #[must_use]
    pub fn with_situation(mut self, situation: impl Into<String>) -> Self {
        self.situation = situation.into();
        self
    }

    /// Nearby agents, nearest first. Ties break by id.
    #[must_use]
    pub fn nearest_first(&self) -> Vec<&NearbyAgent> {
        let mut nearby: Vec<&NearbyAgent> = self.nearby.iter().collect();
        nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        nearby
    }

    /// The nearest agent, if any.
    #[must_use]
    pub fn nearest(&self) -> Option<&NearbyAgent> {
        self.nearest_first().into_iter().next()
    }
}

/// Cache and coalescing key for a decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub(crate) String);

impl Fingerprint {
    /// Hash `agent` in `ctx`, discretizing unit-interval values into
    /// `buckets` bins.
    #[must_use]
    pub fn compute(agent: &AgentState, ctx: &DecisionContext, buckets: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(agent.id.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(agent.planner.current().to_string().as_bytes());
        hasher.update([0]);

        let traits = agent.traits.as_array().map(|v| bucket(v, buckets));
        let emotion = agent.emotion.as_array().map(|v| bucket(v, buckets));
        let needs = needs_array(&agent.needs).map(|v| bucket(v, buckets));
        for b in traits.iter().chain(&emotion).chain(&needs) {
            hasher.update(b.to_le_bytes());
        }

        let mut nearby: Vec<&str> = ctx.nearby.iter().map(|n| n.id.as_str()).collect();
        nearby.sort_unstable();
        nearby.dedup();
        for id in nearby {
            hasher.update(id.as_bytes());
            hasher.update([0]);
        }
        hasher.update([1]);

        let mut events: Vec<&str> = ctx.events.iter().map(String::as_str).collect();
        events.sort_unstable();
        for event in events {
            hasher.update(event.as_bytes());
            hasher.update([0]);
        }
        hasher.update([1]);
        hasher.update(ctx.situation.trim().to_lowercase().as_bytes());

        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn bucket(value: f32, buckets: u32) -> u32 {
    let n = buckets.max(1);
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    ((v * n as f32).floor() as u32).min(n - 1)
}

fn needs_array(needs: &Needs) -> [f32; 4] {
    [needs.hunger, needs.sleep, needs.social, needs.fun]
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// What the agent looked like when the decision was made, for logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Needs at decision time.
    pub needs: Needs,
    /// Dominant emotion, if any.
    pub emotion: Option<Emotion>,
    /// Personality summary.
    pub personality: String,
    /// Planner state before the decision.
    pub state: BehaviorState,
    /// State the planner sampled as its inclination.
    pub intended: Option<BehaviorState>,
    /// Nearby agent ids, nearest first.
    pub nearby: Vec<AgentId>,
    /// Active events.
    pub events: Vec<String>,
    /// Situation text.
    pub situation: String,
    /// Memories that went into the prompt.
    pub memories: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentProfile;
    use npcmind_core::{CoreConfig, TraitVector};

    fn agent(name: &str, needs: Needs) -> AgentState {
        AgentState::new(
            AgentProfile::new(name, TraitVector::default()).with_needs(needs),
            &CoreConfig::default(),
            Utc::now(),
        )
    }

    #[test]
    fn small_drift_keeps_the_fingerprint() {
        let ctx = DecisionContext::new(Utc::now()).with_nearby("B", 2.0);
        let a = Fingerprint::compute(&agent("A", Needs::new(0.75, 0.82, 0.45, 0.60)), &ctx, 4);
        let b = Fingerprint::compute(&agent("A", Needs::new(0.76, 0.80, 0.46, 0.61)), &ctx, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn crossing_a_bucket_changes_it() {
        let ctx = DecisionContext::new(Utc::now());
        let a = Fingerprint::compute(&agent("A", Needs::new(0.74, 0.8, 0.5, 0.6)), &ctx, 4);
        let b = Fingerprint::compute(&agent("A", Needs::new(0.20, 0.8, 0.5, 0.6)), &ctx, 4);
        assert_ne!(a, b);
    }

    #[test]
    fn agent_id_and_surroundings_matter() {
        let needs = Needs::default();
        let ctx = DecisionContext::new(Utc::now());
        let a = Fingerprint::compute(&agent("A", needs), &ctx, 4);
        let b = Fingerprint::compute(&agent("B", needs), &ctx, 4);
        assert_ne!(a, b);

        let with_event = ctx.clone().with_event("festival");
        assert_ne!(a, Fingerprint::compute(&agent("A", needs), &with_event, 4));
    }

    #[test]
    fn nearby_order_and_distance_are_ignored() {
        let state = agent("A", Needs::default());
        let now = Utc::now();
        let one = DecisionContext::new(now).with_nearby("B", 1.0).with_nearby("C", 5.0);
        let two = DecisionContext::new(now).with_nearby("C", 2.0).with_nearby("B", 9.0);
        assert_eq!(Fingerprint::compute(&state, &one, 4), Fingerprint::compute(&state, &two, 4));
    }

    #[test]
    fn nearest_breaks_ties_by_id() {
        let ctx = DecisionContext::new(Utc::now())
            .with_nearby("Z", 3.0)
            .with_nearby("B", 1.0)
            .with_nearby("A", 1.0);
        assert_eq!(ctx.nearest().map(|n| n.id.as_str()), Some("A"));
    }

    #[test]
    fn bucket_edges() {
        assert_eq!(bucket(0.0, 4), 0);
        assert_eq!(bucket(1.0, 4), 3);
        assert_eq!(bucket(0.5, 4), 2);
        assert_eq!(bucket(f32::NAN, 4), 0);
    }
}
