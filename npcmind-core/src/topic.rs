//! Conversation topic selection.
//!
//! Topics form a fixed graph of natural transitions. Each candidate's
//! selection weight is
//!
//! ```text
//! weight(T) = tier_weight(T, relationship) × recency_penalty(T) × personality_match(T)
//! ```
//!
//! Recently used topics are down-weighted, never excluded. A conversation
//! that is already under way continues along the adjacency set of its
//! current topic, except for an occasional jump to the full set; a fresh
//! conversation always draws from the full set.
//!
//! Histories are kept per unordered pair of agents and bounded in length.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::config::TopicConfig;
use crate::personality::{Trait, TraitVector};
use crate::relationship::RelationshipTier;
use crate::types::AgentId;

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// Something two agents can talk about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Small talk about the weather.
    Weather,
    /// Other people and how they get along.
    Relationships,
    /// Pastimes.
    Hobbies,
    /// Jobs and chores.
    Work,
    /// Rumours.
    Gossip,
    /// Hopes and ambitions.
    Dreams,
    /// What is happening around town.
    CurrentEvents,
    /// Shared past.
    Memories,
    /// How each of them feels.
    Feelings,
    /// What comes next.
    Plans,
    /// Things they are good at.
    Skills,
    /// Supplies, goods and tools.
    Resources,
}

impl Topic {
    /// Number of topics.
    pub const COUNT: usize = 12;

    /// Every topic.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Weather,
        Self::Relationships,
        Self::Hobbies,
        Self::Work,
        Self::Gossip,
        Self::Dreams,
        Self::CurrentEvents,
        Self::Memories,
        Self::Feelings,
        Self::Plans,
        Self::Skills,
        Self::Resources,
    ];

    /// Topics a conversation naturally drifts to from this one.
    #[must_use]
    pub const fn transitions(self) -> &'static [Self] {
        match self {
            Self::Weather => &[Self::Work, Self::Plans, Self::Hobbies],
            Self::Relationships => &[Self::Feelings, Self::Gossip, Self::Memories],
            Self::Hobbies => &[Self::Skills, Self::Resources, Self::Plans],
            Self::Work => &[Self::Skills, Self::Resources, Self::Plans],
            Self::Gossip => &[Self::Relationships, Self::CurrentEvents, Self::Feelings],
            Self::Dreams => &[Self::Plans, Self::Feelings, Self::Hobbies],
            Self::CurrentEvents => &[Self::Plans, Self::Relationships, Self::Feelings],
            Self::Memories => &[Self::Relationships, Self::Feelings, Self::Dreams],
            Self::Feelings => &[Self::Relationships, Self::Dreams, Self::Plans],
            Self::Plans => &[Self::Work, Self::Hobbies, Self::Relationships],
            Self::Skills => &[Self::Work, Self::Hobbies, Self::Resources],
            Self::Resources => &[Self::Work, Self::Skills, Self::Plans],
        }
    }

    /// Personal topics that strangers avoid and friends seek out.
    #[must_use]
    pub const fn is_intimate(self) -> bool {
        matches!(
            self,
            Self::Relationships | Self::Feelings | Self::Dreams | Self::Memories | Self::Gossip
        )
    }

    /// Topics that make a conversation worth remembering.
    #[must_use]
    pub const fn is_memorable(self) -> bool {
        matches!(self, Self::Relationships | Self::Dreams | Self::Feelings)
    }

    /// Topic-specific addition to the base relationship change.
    #[must_use]
    pub const fn relationship_modifier(self) -> f32 {
        match self {
            Self::Relationships => 0.05,
            Self::Feelings => 0.04,
            Self::Memories | Self::Dreams => 0.03,
            Self::Gossip => -0.01,
            _ => 0.0,
        }
    }

    /// Weight of this topic at a given relationship tier.
    #[must_use]
    pub fn tier_weight(self, tier: RelationshipTier) -> f32 {
        if !self.is_intimate() {
            return 1.0;
        }
        match tier {
            RelationshipTier::Unfriendly => 0.3,
            RelationshipTier::Neutral => 0.6,
            RelationshipTier::Friendly => 1.0,
            RelationshipTier::CloseFriend => 1.5,
        }
    }

    /// How well the topic suits the speaker and the situation.
    #[must_use]
    pub fn personality_match(self, traits: &TraitVector, situation: &TopicSituation) -> f32 {
        let mut weight = 1.0;
        if traits.get(Trait::Friendliness) > 0.7 && matches!(self, Self::Relationships | Self::Feelings) {
            weight += 0.5;
        }
        if traits.get(Trait::Creativity) > 0.7 && matches!(self, Self::Dreams | Self::Hobbies) {
            weight += 0.5;
        }
        if traits.get(Trait::Confidence) > 0.7 && matches!(self, Self::Plans | Self::Work) {
            weight += 0.5;
        }
        if situation.shared_memories && self == Self::Memories {
            weight += 0.8;
        }
        if situation.active_events && self == Self::CurrentEvents {
            weight += 0.6;
        }
        weight
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Weather => "weather",
            Self::Relationships => "relationships",
            Self::Hobbies => "hobbies",
            Self::Work => "work",
            Self::Gossip => "gossip",
            Self::Dreams => "dreams",
            Self::CurrentEvents => "current_events",
            Self::Memories => "memories",
            Self::Feelings => "feelings",
            Self::Plans => "plans",
            Self::Skills => "skills",
            Self::Resources => "resources",
        })
    }
}

/// Situational hints that raise specific topics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicSituation {
    /// The pair has memories involving each other.
    pub shared_memories: bool,
    /// Something is going on in the world right now.
    pub active_events: bool,
}

/// The speaker's side of a topic choice.
#[derive(Debug, Clone, Copy)]
pub struct Speaker<'a> {
    /// Speaker personality.
    pub traits: &'a TraitVector,
    /// Speaker's opinion of the listener.
    pub relationship: f32,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One exchange between a pair of agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Who started it.
    pub speaker: AgentId,
    /// What was discussed.
    pub topic: Topic,
    /// Relationship change applied to the speaker's opinion.
    pub relationship_delta: f32,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// Bounded conversation history between two agents, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    exchanges: VecDeque<Exchange>,
}

impl ConversationHistory {
    /// Empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Topic of the latest exchange.
    #[must_use]
    pub fn current(&self) -> Option<Topic> {
        self.exchanges.back().map(|e| e.topic)
    }

    /// Whether `topic` appears among the last `window` exchanges.
    #[must_use]
    pub fn used_recently(&self, topic: Topic, window: usize) -> bool {
        self.exchanges.iter().rev().take(window).any(|e| e.topic == topic)
    }

    /// Append an exchange, dropping the oldest beyond `limit`.
    pub fn push(&mut self, exchange: Exchange, limit: usize) {
        self.exchanges.push_back(exchange);
        while self.exchanges.len() > limit.max(1) {
            self.exchanges.pop_front();
        }
    }

    /// Number of exchanges held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Whether the pair has never talked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Exchanges, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }
}

/// Unordered key for a pair of agents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(AgentId, AgentId);

impl PairKey {
    /// Key for `a` and `b` regardless of order.
    #[must_use]
    pub fn new(a: &AgentId, b: &AgentId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Selection weight of `topic` for this speaker and history.
#[must_use]
pub fn topic_weight(
    topic: Topic,
    speaker: &Speaker<'_>,
    history: &ConversationHistory,
    situation: &TopicSituation,
    config: &TopicConfig,
) -> f32 {
    let tier = topic.tier_weight(RelationshipTier::of(speaker.relationship));
    let recency = if history.used_recently(topic, config.recency_window) {
        config.recency_penalty
    } else {
        1.0
    };
    tier * recency * topic.personality_match(speaker.traits, situation)
}

/// Pick the next topic for `speaker` given the pair's `history`.
pub fn select_topic<R: Rng + ?Sized>(
    speaker: &Speaker<'_>,
    history: &ConversationHistory,
    situation: &TopicSituation,
    config: &TopicConfig,
    rng: &mut R,
) -> Topic {
    let candidates: &[Topic] = match history.current() {
        Some(current) if !rng.gen_bool(f64::from(config.fresh_topic_chance.clamp(0.0, 1.0))) => {
            current.transitions()
        }
        _ => &Topic::ALL,
    };

    // A dead end in the adjacency graph widens to the full set; only a
    // fully degenerate weighting falls back to a uniform draw.
    weighted_pick(candidates, speaker, history, situation, config, rng)
        .or_else(|| weighted_pick(&Topic::ALL, speaker, history, situation, config, rng))
        .unwrap_or_else(|| Topic::ALL[rng.gen_range(0..Topic::COUNT)])
}

fn weighted_pick<R: Rng + ?Sized>(
    pool: &[Topic],
    speaker: &Speaker<'_>,
    history: &ConversationHistory,
    situation: &TopicSituation,
    config: &TopicConfig,
    rng: &mut R,
) -> Option<Topic> {
    let weights = pool
        .iter()
        .map(|t| topic_weight(*t, speaker, history, situation, config));
    WeightedIndex::new(weights).ok().map(|dist| pool[dist.sample(rng)])
}

/// Relationship change caused by talking about `topic`, capped at ±0.1.
#[must_use]
pub fn relationship_delta(topic: Topic, friendliness: f32, relationship: f32) -> f32 {
    let mut delta = (0.02 + topic.relationship_modifier()) * (0.5 + friendliness);
    if relationship > 0.7 {
        delta *= 0.5;
    } else if relationship < 0.3 {
        delta *= 1.5;
    }
    delta.clamp(-0.1, 0.1)
}

/// How memorable a conversation is, in [0, 1].
#[must_use]
pub fn conversation_importance(topic: Topic, delta: f32, relationship: f32) -> f32 {
    let mut importance = 0.3;
    if topic.is_memorable() {
        importance += 0.3;
    }
    importance += delta.abs() * 2.0;
    if relationship > 0.7 {
        importance += 0.2;
    }
    importance.min(1.0)
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// A chosen topic with its side effects, ready to apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicChoice {
    /// Chosen topic.
    pub topic: Topic,
    /// Change to the speaker's opinion of the listener.
    pub relationship_delta: f32,
    /// Importance of the resulting conversation memory.
    pub importance: f32,
}

/// Shared per-pair histories plus the selection policy.
#[derive(Debug, Default)]
pub struct TopicManager {
    config: TopicConfig,
    histories: DashMap<PairKey, ConversationHistory>,
}

impl TopicManager {
    /// Create a manager.
    #[must_use]
    pub fn new(config: TopicConfig) -> Self {
        Self {
            config,
            histories: DashMap::new(),
        }
    }

    /// Choose a topic for `a` talking to `b`, record the exchange and
    /// return its effects.
    pub fn converse<R: Rng + ?Sized>(
        &self,
        a: &AgentId,
        b: &AgentId,
        speaker: &Speaker<'_>,
        situation: &TopicSituation,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> TopicChoice {
        let mut history = self.histories.entry(PairKey::new(a, b)).or_default();
        let topic = select_topic(speaker, &history, situation, &self.config, rng);
        let delta = relationship_delta(topic, speaker.traits.get(Trait::Friendliness), speaker.relationship);
        let importance = conversation_importance(topic, delta, speaker.relationship);
        history.push(
            Exchange {
                speaker: a.clone(),
                topic,
                relationship_delta: delta,
                at: now,
            },
            self.config.history_limit,
        );
        TopicChoice {
            topic,
            relationship_delta: delta,
            importance,
        }
    }

    /// Copy of the history between `a` and `b`.
    #[must_use]
    pub fn history(&self, a: &AgentId, b: &AgentId) -> ConversationHistory {
        self.histories
            .get(&PairKey::new(a, b))
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn exchange(topic: Topic) -> Exchange {
        Exchange {
            speaker: AgentId::new("A"),
            topic,
            relationship_delta: 0.0,
            at: Utc::now(),
        }
    }

    #[test]
    fn every_transition_stays_in_graph() {
        for topic in Topic::ALL {
            assert_eq!(topic.transitions().len(), 3, "{topic}");
            assert!(!topic.transitions().contains(&topic));
        }
    }

    #[test]
    fn recent_topics_are_penalised_not_excluded() {
        let traits = TraitVector::default();
        let speaker = Speaker { traits: &traits, relationship: 0.5 };
        let config = TopicConfig::default();
        let mut history = ConversationHistory::new();
        history.push(exchange(Topic::Weather), 20);
        let w = topic_weight(Topic::Weather, &speaker, &history, &TopicSituation::default(), &config);
        assert!((w - config.recency_penalty).abs() < 1e-6);
        assert!(w > 0.0);
    }

    #[test]
    fn strangers_avoid_intimate_topics() {
        let traits = TraitVector::default();
        let history = ConversationHistory::new();
        let config = TopicConfig::default();
        let situation = TopicSituation::default();
        let stranger = Speaker { traits: &traits, relationship: 0.1 };
        let friend = Speaker { traits: &traits, relationship: 0.9 };
        let cold = topic_weight(Topic::Feelings, &stranger, &history, &situation, &config);
        let warm = topic_weight(Topic::Feelings, &friend, &history, &situation, &config);
        assert!(warm > cold * 4.0);
    }

    #[test]
    fn continuing_conversation_follows_adjacency() {
        let traits = TraitVector::default();
        let speaker = Speaker { traits: &traits, relationship: 0.6 };
        let config = TopicConfig {
            fresh_topic_chance: 0.0,
            ..TopicConfig::default()
        };
        let mut history = ConversationHistory::new();
        history.push(exchange(Topic::Weather), 20);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let next = select_topic(&speaker, &history, &TopicSituation::default(), &config, &mut rng);
            assert!(Topic::Weather.transitions().contains(&next), "{next}");
        }
    }

    #[test]
    fn exhausted_adjacency_widens_to_all_topics() {
        let traits = TraitVector::default();
        let speaker = Speaker { traits: &traits, relationship: 0.6 };
        // Zero penalty is rejected by validation; it stands in for a
        // weighting where every neighbour of the current topic is spent.
        let config = TopicConfig {
            fresh_topic_chance: 0.0,
            recency_penalty: 0.0,
            recency_window: 10,
            ..TopicConfig::default()
        };
        let spent = [Topic::Hobbies, Topic::Plans, Topic::Work, Topic::Weather];
        let mut history = ConversationHistory::new();
        for topic in spent {
            history.push(exchange(topic), 20);
        }
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..100 {
            let next = select_topic(&speaker, &history, &TopicSituation::default(), &config, &mut rng);
            assert!(!spent.contains(&next), "picked spent topic {next}");
        }
    }

    #[test]
    fn history_is_bounded() {
        let mut history = ConversationHistory::new();
        for _ in 0..30 {
            history.push(exchange(Topic::Work), 20);
        }
        assert_eq!(history.len(), 20);
    }

    #[test]
    fn relationship_delta_is_capped_and_damped() {
        let close = relationship_delta(Topic::Relationships, 0.5, 0.8);
        let neutral = relationship_delta(Topic::Relationships, 0.5, 0.5);
        assert!((neutral - 0.07).abs() < 1e-6);
        assert!((close - 0.035).abs() < 1e-6);
        assert!(relationship_delta(Topic::Relationships, 10.0, 0.1) <= 0.1);
        assert!(relationship_delta(Topic::Gossip, 0.5, 0.5) > 0.0);
    }

    #[test]
    fn importance_formula() {
        let i = conversation_importance(Topic::Feelings, 0.05, 0.8);
        assert!((i - 0.9).abs() < 1e-6);
        assert!((conversation_importance(Topic::Weather, 0.0, 0.5) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn manager_keys_pairs_symmetrically() {
        let manager = TopicManager::new(TopicConfig::default());
        let traits = TraitVector::default();
        let speaker = Speaker { traits: &traits, relationship: 0.5 };
        let mut rng = StdRng::seed_from_u64(5);
        let a = AgentId::new("A");
        let b = AgentId::new("B");
        manager.converse(&a, &b, &speaker, &TopicSituation::default(), Utc::now(), &mut rng);
        manager.converse(&b, &a, &speaker, &TopicSituation::default(), Utc::now(), &mut rng);
        assert_eq!(manager.history(&a, &b).len(), 2);
        assert_eq!(manager.history(&b, &a).len(), 2);
    }
}
