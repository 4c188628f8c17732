//! Two-candidate-set memory retrieval.
//!
//! 1. The `k` most recent records.
//! 2. The `k` records most similar to the query embedding.
//!
//! The union is deduplicated by id and ranked by recency-weighted
//! similarity (see [`scoring`]); ties go to the more recent record. At most
//! `k` records are returned.

pub mod scoring;

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::memory::MemoryRecord;
use crate::types::{Embedding, MemoryId, RetrievalScore};

/// What the caller is looking for.
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    /// Free-text description of the current situation.
    pub text: String,
    /// Reference time for recency weighting.
    pub now: DateTime<Utc>,
}

impl RetrievalQuery {
    /// Create a query.
    #[must_use]
    pub fn new(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            now,
        }
    }
}

/// A retrieved record with its ranking factors.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    /// The record (cloned out of the store).
    pub record: MemoryRecord,
    /// Clamped cosine similarity to the query.
    pub similarity: f32,
    /// Recency-weighted similarity.
    pub score: RetrievalScore,
}

/// Rank `candidates` for `query` and return at most `k`.
///
/// `candidates` is any view over stored `(record, embedding)` pairs; the
/// function does not assume any ordering.
#[must_use]
pub fn rank<'a, I>(
    candidates: I,
    query: &Embedding,
    now: DateTime<Utc>,
    k: usize,
    lambda_per_hour: f32,
) -> Vec<ScoredMemory>
where
    I: IntoIterator<Item = (&'a MemoryRecord, &'a Embedding)>,
{
    if k == 0 {
        return Vec::new();
    }

    let all: Vec<(&MemoryRecord, f32)> = candidates
        .into_iter()
        .map(|(record, embedding)| (record, scoring::relevance(query, embedding)))
        .collect();

    // Candidate set 1: most recent.
    let mut by_time: Vec<usize> = (0..all.len()).collect();
    by_time.sort_by(|&a, &b| all[b].0.timestamp.cmp(&all[a].0.timestamp));

    // Candidate set 2: most similar.
    let mut by_sim: Vec<usize> = (0..all.len()).collect();
    by_sim.sort_by(|&a, &b| all[b].1.partial_cmp(&all[a].1).unwrap_or(Ordering::Equal));

    let mut seen: HashSet<MemoryId> = HashSet::with_capacity(k * 2);
    let mut merged: Vec<ScoredMemory> = Vec::with_capacity(k * 2);
    for idx in by_time.iter().take(k).chain(by_sim.iter().take(k)) {
        let (record, similarity) = all[*idx];
        if !seen.insert(record.id) {
            continue;
        }
        let recency = scoring::recency_factor(record.timestamp, now, lambda_per_hour);
        merged.push(ScoredMemory {
            record: record.clone(),
            similarity,
            score: RetrievalScore::new(similarity * recency),
        });
    }

    merged.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.record.timestamp.cmp(&a.record.timestamp))
    });
    merged.truncate(k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryKind, MemoryPayload};
    use crate::types::AgentId;
    use chrono::Duration;

    fn rec(text: &str, hours_ago: i64, now: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord::new(
            AgentId::new("A"),
            MemoryKind::Event,
            MemoryPayload::new("A", "x", 0.0, text),
            now - Duration::hours(hours_ago),
        )
    }

    #[test]
    fn merges_recent_and_similar_without_duplicates() {
        let now = Utc::now();
        let q = Embedding(vec![1.0, 0.0]);
        let records = [rec("old but relevant", 100, now), rec("new", 0, now), rec("mid", 10, now)];
        let embeddings = [
            Embedding(vec![1.0, 0.0]),
            Embedding(vec![1.0, 0.0]),
            Embedding(vec![0.0, 1.0]),
        ];
        let out = rank(records.iter().zip(embeddings.iter()), &q, now, 2, 0.01);
        assert_eq!(out.len(), 2);
        let ids: HashSet<MemoryId> = out.iter().map(|m| m.record.id).collect();
        assert_eq!(ids.len(), 2, "no duplicates");
        assert_eq!(out[0].record.payload.text, "new");
        assert_eq!(out[1].record.payload.text, "old but relevant");
    }

    #[test]
    fn ties_prefer_recent() {
        let now = Utc::now();
        let q = Embedding(vec![1.0, 0.0]);
        let records = [rec("older", 5, now), rec("newer", 1, now)];
        let embeddings = [Embedding(vec![0.0, 1.0]), Embedding(vec![0.0, 1.0])];
        let out = rank(records.iter().zip(embeddings.iter()), &q, now, 2, 0.05);
        assert_eq!(out[0].record.payload.text, "newer");
    }

    #[test]
    fn zero_k_is_empty() {
        let now = Utc::now();
        let records = [rec("a", 0, now)];
        let embeddings = [Embedding(vec![1.0])];
        assert!(rank(records.iter().zip(embeddings.iter()), &Embedding(vec![1.0]), now, 0, 0.1).is_empty());
    }
}
