//! Interaction logging.
//!
//! The orchestrator hands exactly one [`DecisionRecord`] per finished
//! decision cycle to an [`InteractionLogger`] supplied at construction.
//! The logger owns the storage format and its lifecycle is one simulation
//! session:
//!
//! ```text
//! open_session ─► record × N ─► flush ─► close
//! ```
//!
//! Implementations:
//!
//! | Logger | Writes to |
//! |---|---|
//! | [`JsonlInteractionLogger`] | `<dir>/session_<id>.jsonl`, one record per line |
//! | [`TracingInteractionLogger`] | `tracing` events on `npcmind::interactions` |
//! | [`MemoryInteractionLogger`] | a `Vec`, for tests |
//! | [`NullInteractionLogger`] | nowhere |

use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use npcmind_core::AgentId;
use npcmind_llm::{DecisionResponse, TierAttempt};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{InteractionLogConfig, LogSink};
use crate::context::{ContextSnapshot, Fingerprint};
use crate::error::Result;

/// Request type tag for agent decisions.
pub const REQUEST_DECISION: &str = "decision";

/// Recent records kept in memory by the JSONL logger.
const RECENT_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Telemetry for one finished decision cycle. Immutable once emitted.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    /// When the cycle finished.
    pub timestamp: DateTime<Utc>,
    /// Deciding agent.
    pub agent: AgentId,
    /// Kind of request.
    pub request_type: String,
    /// Rendered user prompt.
    pub prompt: String,
    /// Agent state the prompt was built from.
    pub context: ContextSnapshot,
    /// Raw text of the accepted reply.
    pub raw_response: String,
    /// Validated decision.
    pub parsed: DecisionResponse,
    /// Tier that produced the decision.
    pub tier: String,
    /// End-to-end latency of the cycle.
    pub latency_ms: u64,
    /// Served from the cache or a coalesced computation.
    pub cached: bool,
    /// A provider tier produced the decision.
    pub success: bool,
    /// Why the provider tiers did not, when they did not.
    pub error: Option<String>,
    /// Every tier attempt made for this cycle.
    pub attempts: Vec<TierAttempt>,
    /// Cache key.
    pub fingerprint: Fingerprint,
}

// ---------------------------------------------------------------------------
// Session statistics
// ---------------------------------------------------------------------------

/// Summary of one logging session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    /// Session id.
    pub session_id: String,
    /// When the session opened.
    pub started_at: Option<DateTime<Utc>>,
    /// Records received.
    pub total: u64,
    /// Records whose decision came from a provider tier.
    pub successes: u64,
    /// Records that fell back to the rule tier.
    pub failures: u64,
    /// Records served from the cache.
    pub cache_hits: u64,
    /// Mean cycle latency.
    pub avg_latency_ms: f64,
    /// Records per producing tier.
    pub by_tier: BTreeMap<String, u64>,
    /// Prompt tokens over every tier attempt.
    pub prompt_tokens: u64,
    /// Completion tokens over every tier attempt.
    pub completion_tokens: u64,
    /// Spend in USD over every tier attempt.
    pub cost_usd: f64,
    /// Spend per attempted tier, including tiers whose reply was rejected.
    pub cost_by_tier: BTreeMap<String, TierSpend>,
    /// Spend per UTC day (`YYYY-MM-DD`).
    pub cost_by_day: BTreeMap<String, TierSpend>,
}

/// Tokens and cost summed over a set of attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TierSpend {
    /// Attempts that got a reply back.
    pub requests: u64,
    /// Prompt plus completion tokens.
    pub tokens: u64,
    /// Spend in USD.
    pub cost_usd: f64,
}

impl TierSpend {
    fn add(&mut self, tokens: u64, cost_usd: f64) {
        self.requests += 1;
        self.tokens += tokens;
        self.cost_usd += cost_usd;
    }
}

impl SessionStats {
    fn open(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_owned(),
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, record: &DecisionRecord) {
        self.total += 1;
        if record.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        if record.cached {
            self.cache_hits += 1;
        }
        self.avg_latency_ms += (record.latency_ms as f64 - self.avg_latency_ms) / self.total as f64;
        *self.by_tier.entry(record.tier.clone()).or_insert(0) += 1;

        let day = record.timestamp.format("%Y-%m-%d").to_string();
        for attempt in &record.attempts {
            let Some(usage) = attempt.usage else { continue };
            self.prompt_tokens += u64::from(usage.prompt_tokens);
            self.completion_tokens += u64::from(usage.completion_tokens);
            self.cost_usd += attempt.cost_usd;
            self.cost_by_tier
                .entry(attempt.tier.clone())
                .or_default()
                .add(usage.total(), attempt.cost_usd);
            self.cost_by_day.entry(day.clone()).or_default().add(usage.total(), attempt.cost_usd);
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Destination for decision records.
pub trait InteractionLogger: Send + Sync {
    /// Start a session. Records before this are dropped.
    ///
    /// # Errors
    /// Returns an error if the session's storage cannot be created.
    fn open_session(&self, session_id: &str) -> Result<()>;

    /// Store one record. Failures are logged, never returned: telemetry
    /// must not break a decision cycle.
    fn record(&self, record: &DecisionRecord);

    /// Push buffered records to storage.
    ///
    /// # Errors
    /// Returns an error if buffered records cannot be written.
    fn flush(&self) -> Result<()>;

    /// Flush and end the session.
    ///
    /// # Errors
    /// Returns an error if the final flush fails.
    fn close(&self) -> Result<SessionStats>;
}

/// Build the logger named by the config.
///
/// # Errors
/// Returns an error if the JSONL directory cannot be created.
pub fn from_config(config: &InteractionLogConfig) -> Result<Arc<dyn InteractionLogger>> {
    Ok(match config.sink {
        LogSink::Jsonl => Arc::new(JsonlInteractionLogger::new(&config.directory)?),
        LogSink::Tracing => Arc::new(TracingInteractionLogger::default()),
        LogSink::None => Arc::new(NullInteractionLogger),
    })
}

// ---------------------------------------------------------------------------
// JSONL
// ---------------------------------------------------------------------------

struct JsonlSession {
    path: PathBuf,
    writer: BufWriter<File>,
    stats: SessionStats,
    recent: VecDeque<DecisionRecord>,
}

/// Writes each session to `session_<id>.jsonl` in a directory.
pub struct JsonlInteractionLogger {
    directory: PathBuf,
    session: Mutex<Option<JsonlSession>>,
}

impl std::fmt::Debug for JsonlInteractionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlInteractionLogger")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl JsonlInteractionLogger {
    /// Logger writing into `directory`, created if missing.
    ///
    /// # Errors
    /// Returns [`EngineError::Io`](crate::EngineError::Io) if the directory
    /// cannot be created.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            session: Mutex::new(None),
        })
    }

    /// Path of the open session's file.
    #[must_use]
    pub fn session_path(&self) -> Option<PathBuf> {
        self.session.lock().as_ref().map(|s| s.path.clone())
    }

    /// The most recent records of the open session, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<DecisionRecord> {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.recent.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Statistics of the open session.
    #[must_use]
    pub fn stats(&self) -> Option<SessionStats> {
        self.session.lock().as_ref().map(|s| s.stats.clone())
    }
}

impl InteractionLogger for JsonlInteractionLogger {
    fn open_session(&self, session_id: &str) -> Result<()> {
        let path = self.directory.join(format!("session_{session_id}.jsonl"));
        let file = File::options().create(true).append(true).open(&path)?;
        let mut session = self.session.lock();
        if let Some(previous) = session.as_mut() {
            previous.writer.flush()?;
        }
        *session = Some(JsonlSession {
            path,
            writer: BufWriter::new(file),
            stats: SessionStats::open(session_id),
            recent: VecDeque::with_capacity(RECENT_LIMIT),
        });
        Ok(())
    }

    fn record(&self, record: &DecisionRecord) {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            warn!(agent = %record.agent, "interaction record dropped: no open session");
            return;
        };
        let written = serde_json::to_writer(&mut session.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|()| session.writer.write_all(b"\n"));
        if let Err(e) = written {
            warn!(path = %session.path.display(), error = %e, "failed to write interaction record");
        }
        session.stats.add(record);
        if session.recent.len() == RECENT_LIMIT {
            session.recent.pop_front();
        }
        session.recent.push_back(record.clone());
    }

    fn flush(&self) -> Result<()> {
        if let Some(session) = self.session.lock().as_mut() {
            session.writer.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<SessionStats> {
        let Some(mut session) = self.session.lock().take() else {
            return Ok(SessionStats::default());
        };
        session.writer.flush()?;
        Ok(session.stats)
    }
}

// ---------------------------------------------------------------------------
// tracing
// ---------------------------------------------------------------------------

/// Emits each record as an INFO event.
#[derive(Debug, Default)]
pub struct TracingInteractionLogger {
    stats: Mutex<Option<SessionStats>>,
}

impl InteractionLogger for TracingInteractionLogger {
    fn open_session(&self, session_id: &str) -> Result<()> {
        info!(target: "npcmind::interactions", session = session_id, "session opened");
        *self.stats.lock() = Some(SessionStats::open(session_id));
        Ok(())
    }

    fn record(&self, record: &DecisionRecord) {
        info!(
            target: "npcmind::interactions",
            agent = %record.agent,
            tier = %record.tier,
            action = %record.parsed.action,
            target_name = %record.parsed.target,
            latency_ms = record.latency_ms,
            cached = record.cached,
            success = record.success,
            attempts = record.attempts.len(),
            cost_usd = record.attempts.iter().map(|a| a.cost_usd).sum::<f64>(),
            fingerprint = %record.fingerprint,
            error = record.error.as_deref().unwrap_or(""),
            "decision"
        );
        if let Some(stats) = self.stats.lock().as_mut() {
            stats.add(record);
        }
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<SessionStats> {
        let stats = self.stats.lock().take().unwrap_or_default();
        info!(
            target: "npcmind::interactions",
            session = %stats.session_id,
            total = stats.total,
            avg_latency_ms = stats.avg_latency_ms,
            prompt_tokens = stats.prompt_tokens,
            completion_tokens = stats.completion_tokens,
            cost_usd = stats.cost_usd,
            "session closed"
        );
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// In-memory and null
// ---------------------------------------------------------------------------

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryInteractionLogger {
    records: Mutex<Vec<DecisionRecord>>,
    stats: Mutex<SessionStats>,
}

impl MemoryInteractionLogger {
    /// Empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record so far.
    #[must_use]
    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.lock().clone()
    }

    /// Number of records so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InteractionLogger for MemoryInteractionLogger {
    fn open_session(&self, session_id: &str) -> Result<()> {
        *self.stats.lock() = SessionStats::open(session_id);
        Ok(())
    }

    fn record(&self, record: &DecisionRecord) {
        self.stats.lock().add(record);
        self.records.lock().push(record.clone());
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<SessionStats> {
        Ok(self.stats.lock().clone())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInteractionLogger;

impl InteractionLogger for NullInteractionLogger {
    fn open_session(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }

    fn record(&self, _record: &DecisionRecord) {}

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<SessionStats> {
        Ok(SessionStats::default())
    }
}
