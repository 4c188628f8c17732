//! Configuration for the agent-state subsystems.
//!
//! These sections are embedded in the engine's `npcmind.toml`; every field
//! has a serde default so partial files are valid.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Configuration for everything in this crate, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Memory store retention and retrieval.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Emotion decay and contagion.
    #[serde(default)]
    pub emotion: EmotionConfig,
    /// Behavior planner learning.
    #[serde(default)]
    pub behavior: BehaviorConfig,
    /// Conversation topic selection.
    #[serde(default)]
    pub topics: TopicConfig,
}

impl CoreConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    /// Returns `CoreError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.memory.retrieval_k == 0 {
            return Err(CoreError::Config("memory.retrieval_k must be at least 1".into()));
        }
        if !positive_finite(self.memory.recency_half_life_hours) {
            return Err(CoreError::Config(
                "memory.recency_half_life_hours must be a positive, finite number".into(),
            ));
        }
        if self.memory.embedding_dimensions == 0 {
            return Err(CoreError::Config(
                "memory.embedding_dimensions must be at least 1".into(),
            ));
        }
        if !positive_finite(self.emotion.decay_time_constant_secs) {
            return Err(CoreError::Config(
                "emotion.decay_time_constant_secs must be a positive, finite number".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.emotion.baseline) {
            return Err(CoreError::Config("emotion.baseline must lie in [0, 1]".into()));
        }
        if !(self.emotion.contagion_rate.is_finite() && self.emotion.contagion_rate >= 0.0) {
            return Err(CoreError::Config("emotion.contagion_rate must not be negative".into()));
        }
        if !(self.behavior.learning_rate > 0.0 && self.behavior.learning_rate <= 1.0) {
            return Err(CoreError::Config("behavior.learning_rate must lie in (0, 1]".into()));
        }
        // Zero would exclude recent topics instead of down-weighting them.
        if !(self.topics.recency_penalty > 0.0 && self.topics.recency_penalty <= 1.0) {
            return Err(CoreError::Config("topics.recency_penalty must lie in (0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.topics.fresh_topic_chance) {
            return Err(CoreError::Config(
                "topics.fresh_topic_chance must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

fn positive_finite(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// How many non-important memory records an agent keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionTier {
    /// 100 records.
    Low,
    /// 500 records.
    Medium,
    /// 1000 records.
    High,
    /// Unbounded; eviction disabled.
    Maximum,
}

impl RetentionTier {
    /// The cap on non-important records, or `None` when eviction is off.
    #[must_use]
    pub fn cap(self) -> Option<usize> {
        match self {
            Self::Low => Some(100),
            Self::Medium => Some(500),
            Self::High => Some(1000),
            Self::Maximum => None,
        }
    }
}

impl Default for RetentionTier {
    fn default() -> Self {
        Self::Medium
    }
}

/// Memory store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Retention tier applied to every agent.
    #[serde(default)]
    pub retention: RetentionTier,
    /// Default number of memories retrieved per decision.
    #[serde(default = "default_5_usize")]
    pub retrieval_k: usize,
    /// Age at which recency weighting halves a memory's score.
    #[serde(default = "default_24_0")]
    pub recency_half_life_hours: f32,
    /// Dimensions of the built-in hashing embedder.
    #[serde(default = "default_256")]
    pub embedding_dimensions: usize,
}

impl MemoryConfig {
    /// Exponential decay constant λ per hour derived from the half-life.
    #[must_use]
    pub fn recency_lambda(&self) -> f32 {
        std::f32::consts::LN_2 / self.recency_half_life_hours
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retention: RetentionTier::Medium,
            retrieval_k: 5,
            recency_half_life_hours: 24.0,
            embedding_dimensions: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Emotion
// ---------------------------------------------------------------------------

/// Emotion dynamics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionConfig {
    /// Time constant τ of the exponential decay toward baseline, in seconds.
    #[serde(default = "default_600_0")]
    pub decay_time_constant_secs: f32,
    /// Neutral value every emotion component relaxes to.
    #[serde(default)]
    pub baseline: f32,
    /// Scale of the contagion nudge between co-located agents.
    #[serde(default = "default_0_3")]
    pub contagion_rate: f32,
    /// Intensity added to the component named by a decision's emotion.
    #[serde(default = "default_0_4")]
    pub stimulus_gain: f32,
    /// Minimum component value for it to count as the dominant emotion.
    #[serde(default = "default_0_15")]
    pub dominance_threshold: f32,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            decay_time_constant_secs: 600.0,
            baseline: 0.0,
            contagion_rate: 0.3,
            stimulus_gain: 0.4,
            dominance_threshold: 0.15,
        }
    }
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Behavior planner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// EMA rate α for learned transition weights.
    #[serde(default = "default_0_1")]
    pub learning_rate: f32,
    /// Starting value of every learned weight.
    #[serde(default = "default_0_5")]
    pub initial_weight: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            initial_weight: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// Conversation topic selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Number of most recent exchanges whose topics get down-weighted.
    #[serde(default = "default_3_usize")]
    pub recency_window: usize,
    /// Multiplier applied to recently used topics.
    #[serde(default = "default_0_25")]
    pub recency_penalty: f32,
    /// Probability of ignoring the adjacency graph mid-conversation.
    #[serde(default = "default_0_15")]
    pub fresh_topic_chance: f32,
    /// Exchanges remembered per pair of agents.
    #[serde(default = "default_20_usize")]
    pub history_limit: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            recency_window: 3,
            recency_penalty: 0.25,
            fresh_topic_chance: 0.15,
            history_limit: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_0_1() -> f32 { 0.1 }
fn default_0_15() -> f32 { 0.15 }
fn default_0_25() -> f32 { 0.25 }
fn default_0_3() -> f32 { 0.3 }
fn default_0_4() -> f32 { 0.4 }
fn default_0_5() -> f32 { 0.5 }
fn default_24_0() -> f32 { 24.0 }
fn default_600_0() -> f32 { 600.0 }
fn default_3_usize() -> usize { 3 }
fn default_5_usize() -> usize { 5 }
fn default_20_usize() -> usize { 20 }
fn default_256() -> usize { 256 }
