//! Per-agent mutable state and the shared registry.
//!
//! Every agent lives behind its own `parking_lot::Mutex`, so different
//! agents never contend. Locks are held only for snapshots and for
//! applying a finished decision, never across an `.await`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use npcmind_core::{
    AgentId, BehaviorPlanner, CoreConfig, EmotionVector, Needs, Position, Relationships, TraitVector,
};
use serde::{Deserialize, Serialize};

/// How an agent starts out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique name.
    pub id: AgentId,
    /// Personality, fixed for the agent's lifetime.
    pub traits: TraitVector,
    /// Starting needs.
    #[serde(default)]
    pub needs: Needs,
    /// Starting position.
    #[serde(default)]
    pub position: Position,
}

impl AgentProfile {
    /// Profile with default needs at the origin.
    #[must_use]
    pub fn new(id: impl Into<AgentId>, traits: TraitVector) -> Self {
        Self {
            id: id.into(),
            traits,
            needs: Needs::default(),
            position: Position::default(),
        }
    }

    /// Override the starting needs.
    #[must_use]
    pub fn with_needs(mut self, needs: Needs) -> Self {
        self.needs = needs;
        self
    }

    /// Override the starting position.
    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

/// Everything the engine tracks about one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Unique name.
    pub id: AgentId,
    /// Immutable personality.
    pub traits: TraitVector,
    /// Current emotion.
    pub emotion: EmotionVector,
    /// When `emotion` was last brought up to date.
    pub emotion_updated_at: DateTime<Utc>,
    /// Needs, written by the simulation.
    pub needs: Needs,
    /// Directed opinions of other agents.
    pub relationships: Relationships,
    /// Where the agent stands.
    pub position: Position,
    /// Behavior state machine and learned weights.
    pub planner: BehaviorPlanner,
    /// When the agent's last decision cycle finished.
    pub last_decision_at: Option<DateTime<Utc>>,
}

impl AgentState {
    /// Fresh state for `profile`.
    #[must_use]
    pub fn new(profile: AgentProfile, config: &CoreConfig, now: DateTime<Utc>) -> Self {
        let planner = BehaviorPlanner::for_personality(&profile.traits, &config.behavior);
        Self {
            id: profile.id,
            traits: profile.traits,
            emotion: EmotionVector::uniform(config.emotion.baseline),
            emotion_updated_at: now,
            needs: profile.needs,
            relationships: Relationships::new(),
            position: profile.position,
            planner,
            last_decision_at: None,
        }
    }

    /// Bring the emotion vector forward to `now` with no new stimulus.
    pub fn decay_emotion(&mut self, now: DateTime<Utc>, config: &CoreConfig) {
        let dt = elapsed_secs(self.emotion_updated_at, now);
        if dt > 0.0 {
            self.emotion = self
                .emotion
                .decayed(dt, config.emotion.baseline, config.emotion.decay_time_constant_secs);
            self.emotion_updated_at = now;
        }
    }
}

/// Shared handle to one agent.
pub type AgentHandle = Arc<parking_lot::Mutex<AgentState>>;

/// All registered agents, keyed by id.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: DashMap<AgentId, AgentHandle>,
}

impl AgentRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an agent and return its handle.
    pub fn insert(&self, state: AgentState) -> AgentHandle {
        let id = state.id.clone();
        let handle = Arc::new(parking_lot::Mutex::new(state));
        self.agents.insert(id, Arc::clone(&handle));
        handle
    }

    /// Handle for `id`.
    #[must_use]
    pub fn get(&self, id: &AgentId) -> Option<AgentHandle> {
        self.agents.get(id).map(|h| Arc::clone(h.value()))
    }

    /// Every registered id.
    #[must_use]
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f32 {
    ((to - from).num_milliseconds().max(0) as f32) / 1000.0
}
