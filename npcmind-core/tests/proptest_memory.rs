//! Property-based tests for state invariants.
//!
//! Bounded domains (relationships, traits, emotions), emotion convergence,
//! retrieval ordering and retention caps must hold for arbitrary inputs.

use std::sync::Arc;

use chrono::{Duration, Utc};
use proptest::prelude::*;

use npcmind_core::behavior::{BehaviorState, TransitionWeights};
use npcmind_core::config::{EmotionConfig, MemoryConfig, RetentionTier};
use npcmind_core::emotion::{Emotion, EmotionVector, Stimulus};
use npcmind_core::memory::{MemoryKind, MemoryPayload, MemoryRecord, MemoryStore};
use npcmind_core::personality::{Trait, TraitVector};
use npcmind_core::relationship::Relationships;
use npcmind_core::retrieval::RetrievalQuery;
use npcmind_core::types::AgentId;
use npcmind_core::HashingEmbedder;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_emotion() -> impl Strategy<Value = Emotion> {
    prop_oneof![
        Just(Emotion::Happy),
        Just(Emotion::Sad),
        Just(Emotion::Angry),
        Just(Emotion::Excited),
    ]
}

fn arb_stimuli() -> impl Strategy<Value = Vec<Stimulus>> {
    prop::collection::vec(
        (arb_emotion(), -50.0..50.0f32).prop_map(|(e, i)| Stimulus::new(e, i)),
        0..8,
    )
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn relationship_stays_in_unit_interval(deltas in prop::collection::vec(-1000.0..1000.0f32, 1..64)) {
        let mut rels = Relationships::new();
        let other = AgentId::new("B");
        for d in deltas {
            let v = rels.adjust(&other, d);
            prop_assert!((0.0..=1.0).contains(&v), "value {} escaped [0,1]", v);
        }
    }

    #[test]
    fn relationship_ignores_non_finite(start in 0.0..1.0f32) {
        let mut rels = Relationships::new();
        let other = AgentId::new("B");
        rels.set(other.clone(), start);
        let before = rels.get(&other);
        rels.adjust(&other, f32::NAN);
        rels.adjust(&other, f32::INFINITY);
        prop_assert!((rels.get(&other) - before).abs() < f32::EPSILON);
    }
}

// ---------------------------------------------------------------------------
// Personality & emotion
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn traits_are_clamped(values in prop::array::uniform10(-10.0..10.0f32)) {
        let t = TraitVector::from_array(values);
        for tr in Trait::ALL {
            prop_assert!((0.0..=1.0).contains(&t.get(tr)));
        }
    }

    #[test]
    fn emotion_updates_stay_bounded(
        start in prop::array::uniform4(0.0..1.0f32),
        stimuli in arb_stimuli(),
        dt in 0.0..10_000.0f32,
    ) {
        let config = EmotionConfig::default();
        let next = EmotionVector::from_array(start).updated(dt, &stimuli, &config);
        for e in Emotion::ALL {
            prop_assert!((0.0..=1.0).contains(&next.get(e)));
        }
    }

    #[test]
    fn emotion_converges_to_baseline(start in prop::array::uniform4(0.0..1.0f32)) {
        let config = EmotionConfig::default();
        let tau = config.decay_time_constant_secs;
        let settled = EmotionVector::from_array(start).decayed(tau * 20.0, config.baseline, tau);
        prop_assert!(settled.deviation_from(config.baseline) < 1e-3);
    }

    #[test]
    fn learned_weight_stays_in_unit_interval(outcomes in prop::collection::vec(-5.0..5.0f32, 1..100)) {
        let mut w = TransitionWeights::uniform(0.5);
        for o in outcomes {
            let v = w.update(BehaviorState::Working, BehaviorState::Resting, o, 0.1);
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }
}

// ---------------------------------------------------------------------------
// Memory store
// ---------------------------------------------------------------------------

fn store(retention: RetentionTier) -> MemoryStore {
    MemoryStore::new(
        MemoryConfig {
            retention,
            ..MemoryConfig::default()
        },
        Arc::new(HashingEmbedder::new(64).expect("embedder")),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn retention_cap_holds_after_every_write(
        writes in 1usize..260,
        important_every in 0usize..10,
    ) {
        let s = store(RetentionTier::Low);
        let agent = AgentId::new("A");
        for n in 0..writes {
            let important = important_every > 0 && n % important_every == 0;
            let record = MemoryRecord::new(
                agent.clone(),
                MemoryKind::Event,
                MemoryPayload::new("A", "x", 0.0, format!("event {n}")),
                Utc::now(),
            )
            .important(important);
            s.write(record).expect("write");
            prop_assert!(s.count_non_important(&agent) <= 100);
        }
    }

    #[test]
    fn retrieve_is_bounded_and_sorted(
        texts in prop::collection::vec("[a-z]{3,8}( [a-z]{3,8}){0,4}", 1..40),
        query in "[a-z]{3,8}( [a-z]{3,8}){0,2}",
        k in 0usize..10,
    ) {
        let s = store(RetentionTier::Medium);
        let agent = AgentId::new("A");
        let now = Utc::now();
        for (i, text) in texts.iter().enumerate() {
            let age = i64::try_from(i).unwrap_or(0);
            s.write(MemoryRecord::new(
                agent.clone(),
                MemoryKind::Conversation,
                MemoryPayload::new("A", "B", 0.2, text.clone()),
                now - Duration::minutes(age * 7),
            ))
            .expect("write");
        }

        let hits = s.retrieve(&agent, &RetrievalQuery::new(query, now), k).expect("retrieve");
        prop_assert!(hits.len() <= k);
        let mut ids: Vec<_> = hits.iter().map(|m| m.record.id).collect();
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        prop_assert_eq!(ids.len(), hits.len());
        for pair in hits.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }
}
