//! Personality traits.
//!
//! A [`TraitVector`] is fixed when an agent is created and never mutated
//! afterwards; every other subsystem reads it to bias behavior, topic
//! choice, and emotional contagion.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::clamp_unit;

/// One personality dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    /// Warmth toward others.
    Friendliness,
    /// Physical and social stamina.
    Energy,
    /// Imagination.
    Creativity,
    /// Preference for order and routine.
    Organization,
    /// Self-assurance.
    Confidence,
    /// Sensitivity to other agents' emotions.
    Empathy,
    /// Playfulness.
    Humor,
    /// Appetite for novelty.
    Curiosity,
    /// Tolerance for delay.
    Patience,
    /// Drive to achieve.
    Ambition,
}

impl Trait {
    /// Number of trait dimensions.
    pub const COUNT: usize = 10;

    /// Every trait, in vector order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Friendliness,
        Self::Energy,
        Self::Creativity,
        Self::Organization,
        Self::Confidence,
        Self::Empathy,
        Self::Humor,
        Self::Curiosity,
        Self::Patience,
        Self::Ambition,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Adjective used in prompt summaries.
    #[must_use]
    pub fn adjective(self) -> &'static str {
        match self {
            Self::Friendliness => "friendly",
            Self::Energy => "energetic",
            Self::Creativity => "creative",
            Self::Organization => "organized",
            Self::Confidence => "confident",
            Self::Empathy => "empathetic",
            Self::Humor => "humorous",
            Self::Curiosity => "curious",
            Self::Patience => "patient",
            Self::Ambition => "ambitious",
        }
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Friendliness => "friendliness",
            Self::Energy => "energy",
            Self::Creativity => "creativity",
            Self::Organization => "organization",
            Self::Confidence => "confidence",
            Self::Empathy => "empathy",
            Self::Humor => "humor",
            Self::Curiosity => "curiosity",
            Self::Patience => "patience",
            Self::Ambition => "ambition",
        };
        f.write_str(name)
    }
}

/// Immutable trait vector; each component lies in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitVector {
    values: [f32; Trait::COUNT],
}

impl TraitVector {
    /// Build from explicit `(trait, value)` pairs; unspecified traits
    /// default to 0.5 and all values are clamped to [0, 1].
    #[must_use]
    pub fn from_pairs(pairs: &[(Trait, f32)]) -> Self {
        let mut values = [0.5; Trait::COUNT];
        for (t, v) in pairs {
            values[t.index()] = clamp_unit(*v);
        }
        Self { values }
    }

    /// Build from a full array in [`Trait::ALL`] order.
    #[must_use]
    pub fn from_array(values: [f32; Trait::COUNT]) -> Self {
        Self {
            values: values.map(clamp_unit),
        }
    }

    /// Sample a plausible personality: each trait is drawn from a
    /// triangular distribution on [0.2, 0.8] peaking at 0.5.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut values = [0.5; Trait::COUNT];
        for v in &mut values {
            *v = triangular(rng, 0.2, 0.8, 0.5);
        }
        Self { values }
    }

    /// Value of one trait.
    #[must_use]
    pub fn get(&self, t: Trait) -> f32 {
        self.values[t.index()]
    }

    /// All values in [`Trait::ALL`] order.
    #[must_use]
    pub fn as_array(&self) -> &[f32; Trait::COUNT] {
        &self.values
    }

    /// Natural-language summary for prompts, e.g.
    /// `"very friendly, quite curious, not very patient"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let parts: Vec<String> = Trait::ALL
            .iter()
            .filter_map(|&t| {
                let v = self.get(t);
                if v > 0.8 {
                    Some(format!("very {}", t.adjective()))
                } else if v > 0.6 {
                    Some(format!("quite {}", t.adjective()))
                } else if v < 0.3 {
                    Some(format!("not very {}", t.adjective()))
                } else {
                    None
                }
            })
            .collect();

        if parts.is_empty() {
            "balanced personality".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl Default for TraitVector {
    fn default() -> Self {
        Self {
            values: [0.5; Trait::COUNT],
        }
    }
}

/// Inverse-CDF sample of a triangular distribution.
fn triangular<R: Rng + ?Sized>(rng: &mut R, low: f32, high: f32, mode: f32) -> f32 {
    let u: f32 = rng.gen_range(0.0..1.0);
    let split = (mode - low) / (high - low);
    if u < split {
        low + ((high - low) * (mode - low) * u).sqrt()
    } else {
        high - ((high - low) * (high - mode) * (1.0 - u)).sqrt()
    }
}
