//! The per-agent memory store.
//!
//! Concurrency model:
//! - Each agent's records sit behind their own `RwLock`, so reads for an
//!   agent run concurrently, writes for one agent serialize, and writes
//!   for different agents never contend.
//! - The agent table is a `DashMap`; its shard lock is only held long
//!   enough to clone the agent's `Arc`.
//!
//! Retention: after every write, while the agent holds more non-important
//! records than the tier's cap, the oldest non-important record (by
//! insertion order) is evicted. Important records are never evicted but
//! still count toward the raw total.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::MemoryConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{CoreError, Result};
use crate::memory::journal::MemoryJournal;
use crate::memory::{MemoryKind, MemoryRecord};
use crate::retrieval::{self, RetrievalQuery, ScoredMemory};
use crate::types::{AgentId, Embedding, MemoryId};

// ---------------------------------------------------------------------------
// Internal storage
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StoredMemory {
    record: MemoryRecord,
    embedding: Embedding,
}

#[derive(Debug, Default)]
struct AgentMemories {
    /// Insertion order; the front is the oldest write.
    records: VecDeque<StoredMemory>,
    non_important: usize,
}

impl AgentMemories {
    fn push(&mut self, memory: StoredMemory) {
        if !memory.record.important {
            self.non_important += 1;
        }
        self.records.push_back(memory);
    }

    fn enforce_cap(&mut self, cap: Option<usize>) -> Vec<MemoryId> {
        let Some(cap) = cap else {
            return Vec::new();
        };
        let mut evicted = Vec::new();
        while self.non_important > cap {
            let Some(pos) = self.records.iter().position(|m| !m.record.important) else {
                break;
            };
            if let Some(m) = self.records.remove(pos) {
                self.non_important -= 1;
                evicted.push(m.record.id);
            }
        }
        evicted
    }
}

// ---------------------------------------------------------------------------
// Public results
// ---------------------------------------------------------------------------

/// Result of a committed write.
#[derive(Debug, Clone)]
pub struct WriteReceipt {
    /// Id of the stored record.
    pub id: MemoryId,
    /// Records evicted to honour the retention cap, oldest first.
    pub evicted: Vec<MemoryId>,
}

/// Counts of an agent's memories by kind in a time window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemorySummary {
    /// Records in the window.
    pub total: usize,
    /// Breakdown by kind.
    pub by_kind: HashMap<MemoryKind, usize>,
    /// Important records in the window.
    pub important: usize,
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Dual-representation memory store shared by all agent workers.
pub struct MemoryStore {
    config: MemoryConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    journal: Option<Arc<dyn MemoryJournal>>,
    agents: DashMap<AgentId, Arc<RwLock<AgentMemories>>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("config", &self.config)
            .field("embedder", &self.embedder.model_name())
            .field("journaled", &self.journal.is_some())
            .field("agents", &self.agents.len())
            .finish()
    }
}

impl MemoryStore {
    /// Create an in-memory store.
    #[must_use]
    pub fn new(config: MemoryConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            config,
            embedder,
            journal: None,
            agents: DashMap::new(),
        }
    }

    /// Mirror every write and eviction to `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: Arc<dyn MemoryJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Store configuration.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn slot(&self, agent: &AgentId) -> Arc<RwLock<AgentMemories>> {
        Arc::clone(self.agents.entry(agent.clone()).or_default().value())
    }

    fn existing_slot(&self, agent: &AgentId) -> Option<Arc<RwLock<AgentMemories>>> {
        self.agents.get(agent).map(|s| Arc::clone(s.value()))
    }

    /// Append a record and its embedding as one unit, then enforce the
    /// retention cap for the owning agent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MemoryWrite`] if the embedding or the journal
    /// append fails. In that case nothing was stored.
    pub fn write(&self, record: MemoryRecord) -> Result<WriteReceipt> {
        let embedding = self
            .embedder
            .embed(&record.payload.embedding_text())
            .map_err(|e| CoreError::MemoryWrite(format!("embedding failed: {e}")))?;

        let slot = self.slot(&record.agent);
        let id = record.id;
        let agent = record.agent.clone();

        let evicted = {
            let mut memories = slot.write();
            if let Some(journal) = &self.journal {
                journal
                    .append(&record, &embedding)
                    .map_err(|e| CoreError::MemoryWrite(e.to_string()))?;
            }
            memories.push(StoredMemory { record, embedding });
            memories.enforce_cap(self.config.retention.cap())
        };

        self.forget_in_journal(&evicted);
        if !evicted.is_empty() {
            debug!(agent = %agent, evicted = evicted.len(), "retention cap enforced");
        }

        Ok(WriteReceipt { id, evicted })
    }

    fn forget_in_journal(&self, evicted: &[MemoryId]) {
        let Some(journal) = &self.journal else {
            return;
        };
        for id in evicted {
            if let Err(e) = journal.remove(id) {
                warn!(memory = %id, error = %e, "failed to drop evicted memory from journal");
            }
        }
    }

    /// Retrieve at most `k` records for `agent`, ranked by recency-weighted
    /// similarity to `query`.
    ///
    /// Each call computes a fresh, finite result.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MemoryRead`] if the query cannot be embedded.
    pub fn retrieve(
        &self,
        agent: &AgentId,
        query: &RetrievalQuery,
        k: usize,
    ) -> Result<Vec<ScoredMemory>> {
        let query_embedding = self
            .embedder
            .embed(&query.text)
            .map_err(|e| CoreError::MemoryRead(format!("query embedding failed: {e}")))?;
        let Some(slot) = self.existing_slot(agent) else {
            return Ok(Vec::new());
        };

        let memories = slot.read();
        Ok(retrieval::rank(
            memories.records.iter().map(|m| (&m.record, &m.embedding)),
            &query_embedding,
            query.now,
            k,
            self.config.recency_lambda(),
        ))
    }

    /// The `n` newest records for `agent`, newest first.
    #[must_use]
    pub fn recent(&self, agent: &AgentId, n: usize) -> Vec<MemoryRecord> {
        let Some(slot) = self.existing_slot(agent) else {
            return Vec::new();
        };
        let memories = slot.read();
        let mut records: Vec<&MemoryRecord> = memories.records.iter().map(|m| &m.record).collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.into_iter().take(n).cloned().collect()
    }

    /// Total records held for `agent`.
    #[must_use]
    pub fn count(&self, agent: &AgentId) -> usize {
        self.existing_slot(agent).map_or(0, |s| s.read().records.len())
    }

    /// Non-important records held for `agent`.
    #[must_use]
    pub fn count_non_important(&self, agent: &AgentId) -> usize {
        self.existing_slot(agent).map_or(0, |s| s.read().non_important)
    }

    /// Whether `id` is still held for `agent`.
    #[must_use]
    pub fn contains(&self, agent: &AgentId, id: &MemoryId) -> bool {
        self.existing_slot(agent)
            .is_some_and(|s| s.read().records.iter().any(|m| m.record.id == *id))
    }

    /// The oldest non-important record for `agent`, i.e. the next eviction
    /// candidate.
    #[must_use]
    pub fn oldest_evictable(&self, agent: &AgentId) -> Option<MemoryRecord> {
        let slot = self.existing_slot(agent)?;
        let memories = slot.read();
        memories
            .records
            .iter()
            .find(|m| !m.record.important)
            .map(|m| m.record.clone())
    }

    /// Count `agent`'s records with `timestamp >= since`.
    #[must_use]
    pub fn summarize(&self, agent: &AgentId, since: DateTime<Utc>) -> MemorySummary {
        let mut summary = MemorySummary::default();
        let Some(slot) = self.existing_slot(agent) else {
            return summary;
        };
        for m in slot.read().records.iter().filter(|m| m.record.timestamp >= since) {
            summary.total += 1;
            *summary.by_kind.entry(m.record.kind).or_insert(0) += 1;
            if m.record.important {
                summary.important += 1;
            }
        }
        summary
    }

    /// Rehydrate from the attached journal, replaying records in write
    /// order and re-applying the retention cap.
    ///
    /// Returns the number of records held afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MemoryRead`] if the journal cannot be read.
    pub fn restore(&self) -> Result<usize> {
        let Some(journal) = &self.journal else {
            return Ok(0);
        };
        let rows = journal
            .load_all()
            .map_err(|e| CoreError::MemoryRead(e.to_string()))?;

        let mut evicted = Vec::new();
        for (record, embedding) in rows {
            let slot = self.slot(&record.agent);
            let mut memories = slot.write();
            memories.push(StoredMemory { record, embedding });
            evicted.extend(memories.enforce_cap(self.config.retention.cap()));
        }
        self.forget_in_journal(&evicted);

        Ok(self.agents.iter().map(|e| e.value().read().records.len()).sum())
    }
}
