//! Emotion vector dynamics: decay, stimulus, and contagion.
//!
//! ```text
//! emotion' = decay(emotion, dt) + stimulusDelta
//! decay(e, dt) = b + (e - b) · exp(-dt / τ)
//! ```
//!
//! Contagion is an explicit pairwise update over a caller-supplied list of
//! co-located agents. It runs once per simulation tick, never per decision,
//! and reads a snapshot so the result does not depend on iteration order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EmotionConfig;
use crate::types::{Position, clamp_unit};

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// One emotion component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    /// Joy, contentment.
    Happy,
    /// Sadness, disappointment.
    Sad,
    /// Anger, frustration.
    Angry,
    /// Excitement, anticipation.
    Excited,
}

impl Emotion {
    /// Number of components.
    pub const COUNT: usize = 4;

    /// Every component, in vector order.
    pub const ALL: [Self; Self::COUNT] = [Self::Happy, Self::Sad, Self::Angry, Self::Excited];

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Excited => "excited",
        })
    }
}

/// An event-driven nudge to one emotion component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    /// Component affected.
    pub emotion: Emotion,
    /// Signed change; the result is clamped after application.
    pub intensity: f32,
}

impl Stimulus {
    /// Create a stimulus.
    #[must_use]
    pub const fn new(emotion: Emotion, intensity: f32) -> Self {
        Self { emotion, intensity }
    }
}

// ---------------------------------------------------------------------------
// EmotionVector
// ---------------------------------------------------------------------------

/// Per-agent emotion intensities, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionVector {
    values: [f32; Emotion::COUNT],
}

impl EmotionVector {
    /// Every component at `level`.
    #[must_use]
    pub fn uniform(level: f32) -> Self {
        Self {
            values: [clamp_unit(level); Emotion::COUNT],
        }
    }

    /// Build from `(emotion, value)` pairs; others are 0.
    #[must_use]
    pub fn from_pairs(pairs: &[(Emotion, f32)]) -> Self {
        let mut values = [0.0; Emotion::COUNT];
        for (e, v) in pairs {
            values[e.index()] = clamp_unit(*v);
        }
        Self { values }
    }

    /// Build from a raw array, clamping each component.
    #[must_use]
    pub fn from_array(values: [f32; Emotion::COUNT]) -> Self {
        Self {
            values: values.map(clamp_unit),
        }
    }

    /// Intensity of one component.
    #[must_use]
    pub fn get(&self, emotion: Emotion) -> f32 {
        self.values[emotion.index()]
    }

    /// All intensities in [`Emotion::ALL`] order.
    #[must_use]
    pub fn as_array(&self) -> &[f32; Emotion::COUNT] {
        &self.values
    }

    /// The strongest component, if it reaches `threshold`.
    ///
    /// Ties resolve to the earlier component in [`Emotion::ALL`].
    #[must_use]
    pub fn dominant(&self, threshold: f32) -> Option<Emotion> {
        let mut best: Option<(Emotion, f32)> = None;
        for e in Emotion::ALL {
            let v = self.get(e);
            if v >= threshold && best.is_none_or(|(_, b)| v > b) {
                best = Some((e, v));
            }
        }
        best.map(|(e, _)| e)
    }

    /// Relax every component toward `baseline` over `dt_secs`.
    #[must_use]
    pub fn decayed(&self, dt_secs: f32, baseline: f32, tau_secs: f32) -> Self {
        if dt_secs <= 0.0 || tau_secs <= 0.0 {
            return *self;
        }
        let keep = (-dt_secs / tau_secs).exp();
        Self {
            values: self.values.map(|v| clamp_unit(baseline + (v - baseline) * keep)),
        }
    }

    /// Add stimuli and clamp.
    #[must_use]
    pub fn stimulated(&self, stimuli: &[Stimulus]) -> Self {
        let mut values = self.values;
        for s in stimuli {
            let slot = &mut values[s.emotion.index()];
            *slot = clamp_unit(*slot + s.intensity);
        }
        Self { values }
    }

    /// Full update: `decay(self, dt) + stimuli`.
    #[must_use]
    pub fn updated(&self, dt_secs: f32, stimuli: &[Stimulus], config: &EmotionConfig) -> Self {
        self.decayed(dt_secs, config.baseline, config.decay_time_constant_secs)
            .stimulated(stimuli)
    }

    /// Largest absolute distance from `baseline` over all components.
    #[must_use]
    pub fn deviation_from(&self, baseline: f32) -> f32 {
        self.values
            .iter()
            .map(|v| (v - baseline).abs())
            .fold(0.0, f32::max)
    }
}

impl Default for EmotionVector {
    fn default() -> Self {
        Self::uniform(0.0)
    }
}

impl fmt::Display for EmotionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = Emotion::ALL
            .iter()
            .map(|e| format!("{e}={:.2}", self.get(*e)))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

// ---------------------------------------------------------------------------
// Contagion
// ---------------------------------------------------------------------------

/// An agent as seen by the contagion pass.
#[derive(Debug, Clone, Copy)]
pub struct CoLocated {
    /// Current emotion vector.
    pub emotion: EmotionVector,
    /// The agent's empathy trait.
    pub empathy: f32,
    /// Where the agent stands.
    pub position: Position,
}

/// Change to `observer` caused by watching `observed` at `distance`.
///
/// The observer's value for the observed agent's dominant component moves
/// toward the observed value by `empathy · rate / (1 + distance)`. A
/// neutral observed agent (no dominant component) transmits nothing.
#[must_use]
pub fn contagion_delta(
    observer: &EmotionVector,
    empathy: f32,
    observed: &EmotionVector,
    distance: f32,
    config: &EmotionConfig,
) -> [f32; Emotion::COUNT] {
    let mut delta = [0.0; Emotion::COUNT];
    let Some(dominant) = observed.dominant(config.dominance_threshold) else {
        return delta;
    };
    let strength =
        (clamp_unit(empathy) * config.contagion_rate / (1.0 + distance.max(0.0))).clamp(0.0, 1.0);
    delta[dominant.index()] = strength * (observed.get(dominant) - observer.get(dominant));
    delta
}

/// One contagion tick over a group of co-located agents.
///
/// Returns the new emotion vectors in the same order as `group`. Every
/// ordered pair contributes once, so agents with different empathy affect
/// each other by different amounts.
#[must_use]
pub fn contagion_pass(group: &[CoLocated], config: &EmotionConfig) -> Vec<EmotionVector> {
    group
        .iter()
        .enumerate()
        .map(|(i, observer)| {
            let mut values = *observer.emotion.as_array();
            for (j, other) in group.iter().enumerate() {
                if i == j {
                    continue;
                }
                let distance = observer.position.distance(&other.position);
                let delta = contagion_delta(
                    &observer.emotion,
                    observer.empathy,
                    &other.emotion,
                    distance,
                    config,
                );
                for (v, d) in values.iter_mut().zip(delta) {
                    *v += d;
                }
            }
            EmotionVector::from_array(values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmotionConfig {
        EmotionConfig::default()
    }

    #[test]
    fn decay_moves_toward_baseline() {
        let e = EmotionVector::from_pairs(&[(Emotion::Angry, 0.9)]);
        let later = e.decayed(600.0, 0.0, 600.0);
        let expected = 0.9 * (-1.0_f32).exp();
        assert!((later.get(Emotion::Angry) - expected).abs() < 1e-5);
    }

    #[test]
    fn long_silence_converges() {
        let e = EmotionVector::from_pairs(&[(Emotion::Happy, 1.0), (Emotion::Sad, 0.7)]);
        let later = e.decayed(60.0 * 60.0 * 24.0, 0.1, 600.0);
        assert!(later.deviation_from(0.1) < 1e-4);
    }

    #[test]
    fn stimulus_is_added_after_decay_and_clamped() {
        let e = EmotionVector::from_pairs(&[(Emotion::Happy, 0.8)]);
        let next = e.updated(0.0, &[Stimulus::new(Emotion::Happy, 0.5)], &config());
        assert!((next.get(Emotion::Happy) - 1.0).abs() < f32::EPSILON);
        let next = e.updated(0.0, &[Stimulus::new(Emotion::Happy, -2.0)], &config());
        assert!(next.get(Emotion::Happy).abs() < f32::EPSILON);
    }

    #[test]
    fn dominant_respects_threshold() {
        let calm = EmotionVector::from_pairs(&[(Emotion::Sad, 0.1)]);
        assert_eq!(calm.dominant(0.15), None);
        let upset = EmotionVector::from_pairs(&[(Emotion::Sad, 0.4), (Emotion::Angry, 0.6)]);
        assert_eq!(upset.dominant(0.15), Some(Emotion::Angry));
    }

    #[test]
    fn contagion_pulls_observer_toward_dominant() {
        let observer = EmotionVector::default();
        let observed = EmotionVector::from_pairs(&[(Emotion::Excited, 0.8)]);
        let delta = contagion_delta(&observer, 1.0, &observed, 0.0, &config());
        assert!(delta[Emotion::Excited as usize] > 0.0);
        assert!(delta[Emotion::Happy as usize].abs() < f32::EPSILON);
    }

    #[test]
    fn contagion_weakens_with_distance_and_low_empathy() {
        let observer = EmotionVector::default();
        let observed = EmotionVector::from_pairs(&[(Emotion::Happy, 0.8)]);
        let near = contagion_delta(&observer, 0.9, &observed, 1.0, &config())[0];
        let far = contagion_delta(&observer, 0.9, &observed, 10.0, &config())[0];
        let cold = contagion_delta(&observer, 0.1, &observed, 1.0, &config())[0];
        assert!(near > far);
        assert!(near > cold);
    }

    #[test]
    fn contagion_is_asymmetric_in_magnitude() {
        let group = [
            CoLocated {
                emotion: EmotionVector::from_pairs(&[(Emotion::Happy, 0.9)]),
                empathy: 0.2,
                position: Position::new(0.0, 0.0),
            },
            CoLocated {
                emotion: EmotionVector::from_pairs(&[(Emotion::Sad, 0.9)]),
                empathy: 0.9,
                position: Position::new(1.0, 0.0),
            },
        ];
        let next = contagion_pass(&group, &config());
        let sad_gain_for_first = next[0].get(Emotion::Sad);
        let happy_gain_for_second = next[1].get(Emotion::Happy);
        assert!(happy_gain_for_second > sad_gain_for_first);
    }
}
