//! Recency-weighted similarity.
//!
//! Score(m) = max(0, cos(query, m)) · exp(-λ · ΔT)
//!
//! ΔT is measured in hours since the memory's timestamp; λ comes from the
//! configured half-life. Negative similarity is treated as no relevance.

use chrono::{DateTime, Utc};

use crate::types::Embedding;

/// Hours between `then` and `now`, never negative.
#[must_use]
pub fn age_hours(then: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let secs = (now - then).num_milliseconds().max(0) as f32 / 1000.0;
    secs / 3600.0
}

/// Recency factor R = e^(-λ · ΔT).
#[must_use]
pub fn recency_factor(then: DateTime<Utc>, now: DateTime<Utc>, lambda_per_hour: f32) -> f32 {
    (-lambda_per_hour * age_hours(then, now)).exp()
}

/// Similarity clamped to [0, 1].
#[must_use]
pub fn relevance(query: &Embedding, memory: &Embedding) -> f32 {
    query.cosine_similarity(memory).max(0.0)
}
