//! Decision orchestrator.
//!
//! One decision cycle:
//!
//! ```text
//! snapshot agent ─► fingerprint ─► cache ──hit/coalesced──────────────┐
//!                                    │ miss                            │
//!                                    ▼                                 │
//!                 sample inclination, retrieve memories, build prompt  │
//!                                    ▼                                 │
//!                 remote tiers (deadline each) ─► rule tier if none    │
//!                                    ▼                                 ▼
//!                          apply: emotion, planner, memory, conversation
//!                                    ▼
//!                          one DecisionRecord to the interaction logger
//! ```
//!
//! [`Engine::decide`] never fails. Provider errors fall through to the
//! next tier, memory read errors yield an empty memory set and memory
//! write errors only cost the agent that one memory.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use npcmind_core::embedding::EmbeddingProvider;
use npcmind_core::emotion::{CoLocated, contagion_pass};
use npcmind_core::metrics::{LatencyPercentiles, LatencyTracker, spans};
use npcmind_core::topic::{Speaker, TopicSituation};
use npcmind_core::{
    AgentId, BehaviorState, CounterSnapshot, Emotion, EngineCounters, HashingEmbedder, MemoryKind,
    MemoryPayload, MemoryRecord, MemoryStore, Needs, Position, RelationshipTier, RetrievalQuery, Stimulus,
    TopicManager, clamp_unit,
};
use npcmind_llm::chain::TierHealthSnapshot;
use npcmind_llm::prompt::{DecisionPrompt, PromptTemplate, RelationshipLine};
use npcmind_llm::{Action, DecisionResponse, EmotionLabel, TierAttempt, TierChain, TierOutcome};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::agent::{AgentHandle, AgentProfile, AgentRegistry, AgentState};
use crate::cache::{CacheSource, CoalescingCache};
use crate::config::EngineConfig;
use crate::context::{ContextSnapshot, DecisionContext, Fingerprint};
use crate::error::{EngineError, Result};
use crate::logger::{DecisionRecord, InteractionLogger, REQUEST_DECISION, SessionStats};
use crate::pacing::{PaceCheck, PaceGuard, Pacer};
use crate::rules;

/// Conversation memories at or above this importance are never evicted.
const IMPORTANT_CONVERSATION: f32 = 0.7;

/// How far back to look for memories about a conversation partner.
const SHARED_MEMORY_LOOKBACK: usize = 20;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// A finished decision, always schema-valid.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    /// Deciding agent.
    pub agent: AgentId,
    /// What to do.
    pub response: DecisionResponse,
    /// Tier that produced it.
    pub tier: String,
    /// Served from the cache or a coalesced computation.
    pub cached: bool,
    /// The rule tier produced it.
    pub from_rules: bool,
    /// Behavior state the agent moved to.
    pub state: BehaviorState,
    /// Cache key.
    pub fingerprint: Fingerprint,
    /// End-to-end latency of the cycle.
    pub latency_ms: u64,
}

/// Result of the expensive part of a cycle; what the cache stores.
#[derive(Debug, Clone)]
struct Computed {
    response: DecisionResponse,
    tier: String,
    raw: String,
    prompt: String,
    attempts: Vec<TierAttempt>,
    from_rules: bool,
    error: Option<String>,
    intended: BehaviorState,
    memories: Vec<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The decision engine for one simulation session.
pub struct Engine {
    config: EngineConfig,
    agents: AgentRegistry,
    memory: MemoryStore,
    topics: TopicManager,
    chain: TierChain,
    template: PromptTemplate,
    cache: CoalescingCache<Fingerprint, Computed>,
    pacer: Arc<Pacer>,
    workers: Arc<Semaphore>,
    logger: Arc<dyn InteractionLogger>,
    counters: EngineCounters,
    latency: LatencyTracker,
    rng: Mutex<StdRng>,
    session_id: String,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("session_id", &self.session_id)
            .field("agents", &self.agents.len())
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine from configuration: HTTP tiers from `[[tiers]]`, an
    /// in-memory store with the hashing embedder.
    ///
    /// # Errors
    /// Returns [`EngineError::Misconfigured`] if the configuration is
    /// rejected or a tier cannot be constructed.
    pub fn new(config: EngineConfig, logger: Arc<dyn InteractionLogger>) -> Result<Self> {
        config.validate()?;
        let chain = TierChain::from_configs(&config.tiers, config.health_policy())
            .map_err(|e| EngineError::Misconfigured(e.to_string()))?;
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(HashingEmbedder::new(config.core.memory.embedding_dimensions)?);
        let memory = MemoryStore::new(config.core.memory.clone(), embedder);
        Self::with_parts(config, chain, memory, logger)
    }

    /// Build an engine around an existing chain and memory store.
    ///
    /// # Errors
    /// Returns [`EngineError::Misconfigured`] if the configuration is
    /// rejected, or an error from the logger's `open_session`.
    pub fn with_parts(
        config: EngineConfig,
        chain: TierChain,
        memory: MemoryStore,
        logger: Arc<dyn InteractionLogger>,
    ) -> Result<Self> {
        config.validate()?;

        let template = match &config.prompt.template_path {
            Some(path) => PromptTemplate::from_toml_file(path).map_err(EngineError::Misconfigured)?,
            None => PromptTemplate::builtin(),
        };
        let capacity = NonZeroUsize::new(config.decision.cache_capacity)
            .ok_or_else(|| EngineError::Misconfigured("decision.cache_capacity must be at least 1".into()))?;
        let rng = config
            .general
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        let session_id = uuid::Uuid::new_v4().simple().to_string();
        logger.open_session(&session_id)?;
        info!(
            session = %session_id,
            remote_tiers = chain.len(),
            worst_case_ms = millis(chain.worst_case()),
            "engine session started"
        );

        Ok(Self {
            cache: CoalescingCache::new(capacity, config.decision.cache_ttl()),
            pacer: Arc::new(Pacer::new(config.decision.cooldown_min_secs, config.decision.cooldown_max_secs)),
            workers: Arc::new(Semaphore::new(config.decision.max_concurrent_agents)),
            topics: TopicManager::new(config.core.topics.clone()),
            agents: AgentRegistry::new(),
            counters: EngineCounters::new(),
            latency: LatencyTracker::new(),
            rng: Mutex::new(rng),
            config,
            memory,
            chain,
            template,
            logger,
            session_id,
        })
    }

    // -- agents ------------------------------------------------------------

    /// Add an agent, replacing any agent with the same id.
    pub fn register_agent(&self, profile: AgentProfile) -> AgentHandle {
        let state = AgentState::new(profile, &self.config.core, Utc::now());
        debug!(agent = %state.id, initial = %state.planner.current(), "agent registered");
        self.agents.insert(state)
    }

    /// Handle for a registered agent.
    #[must_use]
    pub fn agent(&self, id: &AgentId) -> Option<AgentHandle> {
        self.agents.get(id)
    }

    /// Every registered agent id.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.ids()
    }

    /// Overwrite an agent's needs (the simulation owns them).
    ///
    /// Returns `false` if the agent is unknown.
    pub fn update_needs(&self, id: &AgentId, needs: Needs) -> bool {
        self.agents.get(id).is_some_and(|h| {
            h.lock().needs = needs;
            true
        })
    }

    /// Move an agent.
    ///
    /// Returns `false` if the agent is unknown.
    pub fn set_position(&self, id: &AgentId, position: Position) -> bool {
        self.agents.get(id).is_some_and(|h| {
            h.lock().position = position;
            true
        })
    }

    // -- decisions ---------------------------------------------------------

    /// Run one decision cycle for `agent`.
    ///
    /// Always returns a schema-valid decision, within the sum of the tier
    /// deadlines plus local overhead. Emits exactly one decision record.
    pub async fn decide(&self, agent: &AgentHandle, ctx: &DecisionContext) -> Decision {
        let id = agent.lock().id.clone();
        let span = info_span!(spans::DECIDE, agent = %id);
        self.decide_inner(agent, ctx).instrument(span).await
    }

    async fn decide_inner(&self, agent: &AgentHandle, ctx: &DecisionContext) -> Decision {
        let started = Instant::now();
        let snapshot = {
            let mut state = agent.lock();
            state.decay_emotion(ctx.now, &self.config.core);
            state.clone()
        };
        let fingerprint = Fingerprint::compute(&snapshot, ctx, self.config.decision.state_buckets);

        let (computed, source) = self
            .cache
            .get_or_compute(&fingerprint, || self.compute(&snapshot, ctx))
            .await;
        match source {
            CacheSource::Hit => EngineCounters::bump(&self.counters.cache_hits),
            CacheSource::Coalesced => EngineCounters::bump(&self.counters.coalesced),
            CacheSource::Computed => {}
        }

        let state = self.apply(agent, &snapshot, &computed, ctx);
        let latency = started.elapsed();
        let cached = source.is_cached();

        let record = DecisionRecord {
            timestamp: Utc::now(),
            agent: snapshot.id.clone(),
            request_type: REQUEST_DECISION.into(),
            prompt: computed.prompt.clone(),
            context: ContextSnapshot {
                needs: snapshot.needs,
                emotion: snapshot.emotion.dominant(self.config.core.emotion.dominance_threshold),
                personality: snapshot.traits.summary(),
                state: snapshot.planner.current(),
                intended: Some(computed.intended),
                nearby: ctx.nearest_first().into_iter().map(|n| n.id.clone()).collect(),
                events: ctx.events.clone(),
                situation: ctx.situation.clone(),
                memories: computed.memories.clone(),
            },
            raw_response: computed.raw.clone(),
            parsed: computed.response.clone(),
            tier: computed.tier.clone(),
            latency_ms: millis(latency),
            cached,
            success: !computed.from_rules || computed.error.is_none(),
            error: computed.error.clone(),
            attempts: if cached { Vec::new() } else { computed.attempts.clone() },
            fingerprint: fingerprint.clone(),
        };
        self.logger.record(&record);
        EngineCounters::bump(&self.counters.decisions);
        self.latency.record(latency);

        debug!(
            action = %computed.response.action,
            target = %computed.response.target,
            tier = %computed.tier,
            cached,
            latency_ms = millis(latency),
            "decision complete"
        );

        Decision {
            agent: snapshot.id,
            response: computed.response,
            tier: computed.tier,
            cached,
            from_rules: computed.from_rules,
            state,
            fingerprint,
            latency_ms: millis(latency),
        }
    }

    async fn compute(&self, snapshot: &AgentState, ctx: &DecisionContext) -> Computed {
        let intended = {
            let mut rng = self.rng.lock();
            snapshot.planner.sample_next(&snapshot.needs, &snapshot.traits, &mut *rng)
        };
        let memories = self.recall(snapshot, ctx);
        let prompt = self.build_prompt(snapshot, ctx, intended, &memories);
        let request = prompt.to_request(&self.template);

        let outcome = self.chain.run(&request).await;
        for attempt in &outcome.attempts {
            EngineCounters::bump(match attempt.outcome {
                TierOutcome::Success => &self.counters.tier_success,
                TierOutcome::Timeout => &self.counters.tier_timeouts,
                TierOutcome::TransportError => &self.counters.tier_transport_errors,
                TierOutcome::ValidationError => &self.counters.tier_malformed,
            });
        }

        if let Some(accepted) = outcome.accepted {
            return Computed {
                response: accepted.response,
                tier: accepted.tier,
                raw: accepted.raw,
                prompt: request.prompt,
                attempts: outcome.attempts,
                from_rules: false,
                error: None,
                intended,
                memories,
            };
        }

        let response = rules::decide(&snapshot.needs, intended, ctx);
        let raw = serde_json::to_string(&response).unwrap_or_default();
        let error = (!outcome.attempts.is_empty()).then(|| {
            let failures: Vec<String> = outcome
                .attempts
                .iter()
                .map(|a| format!("{}: {}", a.tier, a.error.as_deref().unwrap_or("failed")))
                .collect();
            format!("all provider tiers failed ({})", failures.join("; "))
        });
        if let Some(error) = &error {
            EngineCounters::bump(&self.counters.rule_fallbacks);
            warn!(agent = %snapshot.id, %error, "falling back to rule tier");
        }
        Computed {
            response,
            tier: self.config.rule_tier_name().to_owned(),
            raw,
            prompt: request.prompt,
            attempts: outcome.attempts,
            from_rules: true,
            error,
            intended,
            memories,
        }
    }

    fn recall(&self, snapshot: &AgentState, ctx: &DecisionContext) -> Vec<String> {
        let _span = info_span!(spans::MEMORY_RETRIEVE, agent = %snapshot.id).entered();
        let mut text = ctx.situation.clone();
        for n in &ctx.nearby {
            text.push(' ');
            text.push_str(n.id.as_str());
        }
        for e in &ctx.events {
            text.push(' ');
            text.push_str(e);
        }
        let query = RetrievalQuery::new(text, ctx.now);
        match self.memory.retrieve(&snapshot.id, &query, self.config.core.memory.retrieval_k) {
            Ok(found) => found.iter().map(|m| m.record.describe()).collect(),
            Err(e) => {
                EngineCounters::bump(&self.counters.memory_read_failures);
                warn!(agent = %snapshot.id, error = %e, "memory retrieval failed, deciding without memories");
                Vec::new()
            }
        }
    }

    fn build_prompt(
        &self,
        snapshot: &AgentState,
        ctx: &DecisionContext,
        intended: BehaviorState,
        memories: &[String],
    ) -> DecisionPrompt {
        let emotion = snapshot
            .emotion
            .dominant(self.config.core.emotion.dominance_threshold)
            .map_or_else(|| "neutral".to_owned(), |e| e.to_string());
        DecisionPrompt {
            name: snapshot.id.to_string(),
            personality: snapshot.traits.summary(),
            needs: [
                snapshot.needs.hunger,
                snapshot.needs.sleep,
                snapshot.needs.social,
                snapshot.needs.fun,
            ],
            situation: ctx.situation.clone(),
            nearby: ctx.nearest_first().into_iter().map(|n| n.id.to_string()).collect(),
            emotion,
            events: ctx.events.clone(),
            memories: memories.to_vec(),
            relationships: snapshot
                .relationships
                .strongest(5)
                .into_iter()
                .map(|(other, value)| RelationshipLine {
                    name: other.to_string(),
                    value,
                    label: RelationshipTier::of(value).to_string(),
                })
                .collect(),
            inclination: intended.to_string(),
        }
    }

    // -- applying results --------------------------------------------------

    fn apply(
        &self,
        agent: &AgentHandle,
        snapshot: &AgentState,
        computed: &Computed,
        ctx: &DecisionContext,
    ) -> BehaviorState {
        let response = &computed.response;
        let to = state_for(response.action, computed.intended);
        {
            let mut state = agent.lock();
            state.decay_emotion(ctx.now, &self.config.core);
            if let Some(emotion) = emotion_for(response.emotion) {
                state.emotion = state
                    .emotion
                    .stimulated(&[Stimulus::new(emotion, self.config.core.emotion.stimulus_gain)]);
            }
            let transition = state.planner.commit(to);
            state.last_decision_at = Some(ctx.now);
            debug!(agent = %state.id, from = %transition.from, to = %transition.to, "planner transition");
        }

        let text = if response.dialogue.is_empty() {
            format!("Decided to {} {}", response.action, response.target)
        } else {
            format!("Decided to {} {}: \"{}\"", response.action, response.target, response.dialogue)
        };
        self.remember(MemoryRecord::new(
            snapshot.id.clone(),
            MemoryKind::Event,
            MemoryPayload::new(snapshot.id.as_str(), response.target.as_str(), valence(response.emotion), text),
            ctx.now,
        ));

        if response.action == Action::TalkTo {
            self.converse(agent, snapshot, &response.target, ctx);
        }
        to
    }

    fn converse(&self, agent: &AgentHandle, snapshot: &AgentState, target: &str, ctx: &DecisionContext) {
        let listener = AgentId::new(target);
        let known = ctx.nearby.iter().any(|n| n.id == listener) || self.agents.get(&listener).is_some();
        if target.is_empty() || listener == snapshot.id || !known {
            debug!(agent = %snapshot.id, target, "talk_to target not present, no conversation");
            return;
        }

        let situation = TopicSituation {
            shared_memories: self
                .memory
                .recent(&snapshot.id, SHARED_MEMORY_LOOKBACK)
                .iter()
                .any(|r| r.payload.subject == target && r.kind == MemoryKind::Conversation),
            active_events: !ctx.events.is_empty(),
        };
        let before = agent.lock().relationships.get(&listener);
        let choice = {
            let speaker = Speaker {
                traits: &snapshot.traits,
                relationship: before,
            };
            let mut rng = self.rng.lock();
            self.topics
                .converse(&snapshot.id, &listener, &speaker, &situation, ctx.now, &mut *rng)
        };
        let after = agent.lock().relationships.adjust(&listener, choice.relationship_delta);
        debug!(
            agent = %snapshot.id,
            listener = %listener,
            topic = %choice.topic,
            delta = choice.relationship_delta,
            relationship = after,
            "conversation"
        );

        let important = choice.importance >= IMPORTANT_CONVERSATION;
        self.remember(
            MemoryRecord::new(
                snapshot.id.clone(),
                MemoryKind::Conversation,
                MemoryPayload::new(
                    snapshot.id.as_str(),
                    target,
                    (choice.relationship_delta * 10.0).clamp(-1.0, 1.0),
                    format!("Talked with {target} about {}", choice.topic),
                ),
                ctx.now,
            )
            .important(important),
        );

        let (old_tier, new_tier) = (RelationshipTier::of(before), RelationshipTier::of(after));
        if old_tier != new_tier {
            self.remember(MemoryRecord::new(
                snapshot.id.clone(),
                MemoryKind::Relationship,
                MemoryPayload::new(
                    snapshot.id.as_str(),
                    target,
                    if after > before { 0.5 } else { -0.5 },
                    format!("{target} went from {old_tier} to {new_tier}"),
                ),
                ctx.now,
            ));
        }
    }

    fn remember(&self, record: MemoryRecord) {
        let _span = info_span!(spans::MEMORY_WRITE, agent = %record.agent, kind = %record.kind).entered();
        let agent = record.agent.clone();
        match self.memory.write(record) {
            Ok(receipt) => {
                EngineCounters::bump(&self.counters.memory_writes);
                EngineCounters::add(&self.counters.evictions, receipt.evicted.len() as u64);
            }
            Err(e) => {
                EngineCounters::bump(&self.counters.memory_write_failures);
                warn!(agent = %agent, error = %e, "memory write failed, continuing without it");
            }
        }
    }

    // -- outcomes and ticks ------------------------------------------------

    /// Report how well the agent's last decision went, `score` in [0, 1].
    ///
    /// Feeds the learned weight of the transition that decision took.
    /// Returns the new weight, or `None` if the agent is unknown or has no
    /// transition awaiting an outcome.
    pub fn report_outcome(&self, id: &AgentId, score: f32) -> Option<f32> {
        let handle = self.agents.get(id)?;
        let mut state = handle.lock();
        let (transition, weight) = state
            .planner
            .record_outcome(clamp_unit(score), &self.config.core.behavior)?;
        debug!(agent = %id, from = %transition.from, to = %transition.to, weight, "learned weight updated");
        Some(weight)
    }

    /// One emotional contagion pass over a group of co-located agents.
    ///
    /// Unknown ids are skipped. Returns the number of agents updated.
    pub fn contagion_tick(&self, group: &[AgentId], now: DateTime<Utc>) -> usize {
        let _span = info_span!(spans::CONTAGION, group = group.len()).entered();
        let handles: Vec<AgentHandle> = group.iter().filter_map(|id| self.agents.get(id)).collect();
        if handles.len() < 2 {
            return 0;
        }
        let seen: Vec<CoLocated> = handles
            .iter()
            .map(|h| {
                let mut state = h.lock();
                state.decay_emotion(now, &self.config.core);
                CoLocated {
                    emotion: state.emotion,
                    empathy: state.traits.get(npcmind_core::Trait::Empathy),
                    position: state.position,
                }
            })
            .collect();
        let updated = contagion_pass(&seen, &self.config.core.emotion);
        for (handle, emotion) in handles.iter().zip(updated) {
            let mut state = handle.lock();
            state.emotion = emotion;
            state.emotion_updated_at = now;
        }
        handles.len()
    }

    // -- scheduling --------------------------------------------------------

    fn claim(&self, id: &AgentId) -> Option<PaceGuard> {
        let check = {
            let mut rng = self.rng.lock();
            self.pacer.try_begin(id, &mut *rng)
        };
        match check {
            PaceCheck::Due(guard) => Some(guard),
            PaceCheck::NotDue => None,
            PaceCheck::Deferred => {
                EngineCounters::bump(&self.counters.deferred);
                debug!(agent = %id, "decision deferred, one already in flight");
                None
            }
        }
    }

    /// Run a cycle for `id` if its cooldown has elapsed and nothing is in
    /// flight for it.
    pub async fn decide_if_due(&self, id: &AgentId, ctx: &DecisionContext) -> Option<Decision> {
        let handle = self.agents.get(id)?;
        let guard = self.claim(id)?;
        let decision = self.decide(&handle, ctx).await;
        drop(guard);
        Some(decision)
    }

    /// Spawn one task per due, idle agent in `batch`.
    ///
    /// At most `decision.max_concurrent_agents` cycles run at once; a slow
    /// provider call holds only its own worker.
    pub fn spawn_due(self: &Arc<Self>, batch: Vec<(AgentId, DecisionContext)>) -> Vec<JoinHandle<Decision>> {
        let mut tasks = Vec::new();
        for (id, ctx) in batch {
            let Some(handle) = self.agents.get(&id) else {
                continue;
            };
            let Some(guard) = self.claim(&id) else {
                continue;
            };
            let engine = Arc::clone(self);
            let workers = Arc::clone(&self.workers);
            tasks.push(tokio::spawn(async move {
                let _permit = workers.acquire_owned().await.ok();
                let decision = engine.decide(&handle, &ctx).await;
                drop(guard);
                decision
            }));
        }
        tasks
    }

    // -- observation -------------------------------------------------------

    /// Counter snapshot.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Latency percentiles over recent cycles.
    #[must_use]
    pub fn latency(&self) -> LatencyPercentiles {
        self.latency.percentiles()
    }

    /// Health of every remote tier.
    #[must_use]
    pub fn tier_health(&self) -> Vec<TierHealthSnapshot> {
        self.chain.health()
    }

    /// Worst-case time a cycle can spend in the remote tiers.
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        self.chain.worst_case()
    }

    /// The memory store.
    #[must_use]
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// The conversation topic manager.
    #[must_use]
    pub fn topics(&self) -> &TopicManager {
        &self.topics
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Id of the logging session.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Flush and close the logging session.
    ///
    /// # Errors
    /// Returns the logger's error if the final flush fails.
    pub fn shutdown(&self) -> Result<SessionStats> {
        self.logger.flush()?;
        let stats = self.logger.close()?;
        info!(session = %self.session_id, decisions = stats.total, cost_usd = stats.cost_usd, "engine session closed");
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Behavior state an action puts the agent in. The intended state is kept
/// when the action serves it.
fn state_for(action: Action, intended: BehaviorState) -> BehaviorState {
    use BehaviorState as S;
    let serves: &[BehaviorState] = match action {
        Action::TalkTo => &[S::Socializing, S::Helping],
        Action::AttendEvent => &[S::Socializing],
        Action::Work => &[S::Working, S::Learning, S::Planning, S::Helping],
        Action::MoveTo | Action::Play => &[S::Exploring],
        Action::Rest | Action::Eat => &[S::Resting],
    };
    if serves.contains(&intended) { intended } else { serves[0] }
}

fn emotion_for(label: EmotionLabel) -> Option<Emotion> {
    match label {
        EmotionLabel::Happy => Some(Emotion::Happy),
        EmotionLabel::Sad => Some(Emotion::Sad),
        EmotionLabel::Angry => Some(Emotion::Angry),
        EmotionLabel::Excited => Some(Emotion::Excited),
        EmotionLabel::Neutral => None,
    }
}

fn valence(label: EmotionLabel) -> f32 {
    match label {
        EmotionLabel::Happy => 0.5,
        EmotionLabel::Excited => 0.6,
        EmotionLabel::Neutral => 0.0,
        EmotionLabel::Sad => -0.4,
        EmotionLabel::Angry => -0.6,
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
