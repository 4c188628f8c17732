//! End-to-end memory flows: retention, retrieval and journal restore.

use std::sync::Arc;

use chrono::{Duration, Utc};

use npcmind_core::config::{MemoryConfig, RetentionTier};
use npcmind_core::memory::{MemoryKind, MemoryPayload, MemoryRecord, MemoryStore, SqliteJournal};
use npcmind_core::retrieval::RetrievalQuery;
use npcmind_core::types::AgentId;
use npcmind_core::{EmbeddingProvider, HashingEmbedder};

fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashingEmbedder::new(128).expect("embedder"))
}

fn config(retention: RetentionTier) -> MemoryConfig {
    MemoryConfig {
        retention,
        ..MemoryConfig::default()
    }
}

fn event(agent: &AgentId, n: usize, minutes: i64) -> MemoryRecord {
    MemoryRecord::new(
        agent.clone(),
        MemoryKind::Event,
        MemoryPayload::new(agent.as_str(), "square", 0.1, format!("event number {n}")),
        Utc::now() - Duration::minutes(1_000 - minutes),
    )
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

#[test]
fn low_tier_keeps_exactly_one_hundred() {
    let store = MemoryStore::new(config(RetentionTier::Low), embedder());
    let agent = AgentId::new("A");

    let mut ids = Vec::new();
    for n in 1..=101 {
        let receipt = store.write(event(&agent, n, i64::try_from(n).expect("small"))).expect("write");
        ids.push(receipt.id);
    }

    assert_eq!(store.count(&agent), 100);
    assert!(!store.contains(&agent, &ids[0]), "record #1 should be evicted");
    let oldest = store.oldest_evictable(&agent).expect("oldest");
    assert_eq!(oldest.id, ids[1], "record #2 should now be the oldest");
}

#[test]
fn important_records_survive_any_pressure() {
    let store = MemoryStore::new(config(RetentionTier::Low), embedder());
    let agent = AgentId::new("A");

    let keep = store
        .write(event(&agent, 0, 0).important(true))
        .expect("write important")
        .id;
    for n in 1..=250 {
        store.write(event(&agent, n, 1)).expect("write");
    }

    assert!(store.contains(&agent, &keep));
    assert_eq!(store.count_non_important(&agent), 100);
    assert_eq!(store.count(&agent), 101);
}

#[test]
fn maximum_tier_never_evicts() {
    let store = MemoryStore::new(config(RetentionTier::Maximum), embedder());
    let agent = AgentId::new("A");
    for n in 0..1_200 {
        let receipt = store.write(event(&agent, n, 0)).expect("write");
        assert!(receipt.evicted.is_empty());
    }
    assert_eq!(store.count(&agent), 1_200);
}

#[test]
fn agents_have_independent_caps() {
    let store = MemoryStore::new(config(RetentionTier::Low), embedder());
    let a = AgentId::new("A");
    let b = AgentId::new("B");
    for n in 0..150 {
        store.write(event(&a, n, 0)).expect("write");
    }
    store.write(event(&b, 0, 0)).expect("write");
    assert_eq!(store.count(&a), 100);
    assert_eq!(store.count(&b), 1);
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

#[test]
fn retrieval_surfaces_relevant_old_memory() {
    let store = MemoryStore::new(config(RetentionTier::Medium), embedder());
    let agent = AgentId::new("A");
    let now = Utc::now();

    store
        .write(MemoryRecord::new(
            agent.clone(),
            MemoryKind::Relationship,
            MemoryPayload::new("A", "B", 0.9, "B saved me from the wolves in the forest"),
            now - Duration::hours(2),
        ))
        .expect("write");
    for n in 0..20 {
        store
            .write(MemoryRecord::new(
                agent.clone(),
                MemoryKind::Event,
                MemoryPayload::new("A", "farm", 0.0, format!("watered turnip row {n}")),
                now - Duration::minutes(n),
            ))
            .expect("write");
    }

    let hits = store
        .retrieve(&agent, &RetrievalQuery::new("wolves forest B", now), 3)
        .expect("retrieve");
    assert!(hits.len() <= 3);
    assert!(hits.iter().any(|m| m.record.payload.text.contains("wolves")));
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn unknown_agent_retrieves_nothing() {
    let store = MemoryStore::new(MemoryConfig::default(), embedder());
    let hits = store
        .retrieve(&AgentId::new("ghost"), &RetrievalQuery::new("anything", Utc::now()), 5)
        .expect("retrieve");
    assert!(hits.is_empty());
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

#[test]
fn journal_restores_a_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("memories.db");
    let agent = AgentId::new("A");

    {
        let journal = Arc::new(SqliteJournal::open(&path).expect("open"));
        let store = MemoryStore::new(config(RetentionTier::Low), embedder()).with_journal(journal.clone());
        for n in 0..105 {
            store.write(event(&agent, n, i64::try_from(n).expect("small"))).expect("write");
        }
        assert_eq!(journal.len().expect("len"), 100, "evictions reach the journal");
    }

    let journal = Arc::new(SqliteJournal::open(&path).expect("reopen"));
    let store = MemoryStore::new(config(RetentionTier::Low), embedder()).with_journal(journal);
    assert_eq!(store.restore().expect("restore"), 100);
    let newest = store.recent(&agent, 1);
    assert_eq!(newest[0].payload.text, "event number 104");
}
