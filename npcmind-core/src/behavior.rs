//! Behavior planner: a finite-state machine with learned transition weights.
//!
//! weight(S→T) = needs_match(T) × personality_affinity(T) × learned(S→T)
//!
//! The next state is drawn by weighted random sampling over all seven
//! states. When the outcome of a transition becomes known, its learned
//! weight moves by an exponential moving average:
//!
//! ```text
//! w' = w + α · (outcome − w),   outcome ∈ [0, 1]
//! ```
//!
//! There is no terminal state; an agent cycles for its whole lifetime.

use std::fmt;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::config::BehaviorConfig;
use crate::personality::{Trait, TraitVector};
use crate::types::{Needs, clamp_unit};

/// Floor applied to each weight factor so no state becomes unreachable.
const FACTOR_FLOOR: f32 = 0.05;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// High-level activity an agent is engaged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorState {
    /// Seeking company and conversation.
    Socializing,
    /// Doing a job.
    Working,
    /// Wandering and looking around.
    Exploring,
    /// Studying or practising.
    Learning,
    /// Assisting someone.
    Helping,
    /// Organising what comes next.
    Planning,
    /// Recovering energy.
    Resting,
}

impl BehaviorState {
    /// Number of states.
    pub const COUNT: usize = 7;

    /// Every state, in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Socializing,
        Self::Working,
        Self::Exploring,
        Self::Learning,
        Self::Helping,
        Self::Planning,
        Self::Resting,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// How strongly the current needs call for this state.
    ///
    /// Each state answers the deficit (`1 - level`) of the need it serves.
    /// States that serve no need get the calm left over after the most
    /// urgent deficit, so an urgent need crowds them out.
    #[must_use]
    pub fn needs_match(self, needs: &Needs) -> f32 {
        let deficit = |v: f32| 1.0 - clamp_unit(v);
        let worst = [needs.hunger, needs.sleep, needs.social, needs.fun]
            .into_iter()
            .map(deficit)
            .fold(0.0_f32, f32::max);
        let calm = 1.0 - worst;
        let raw = match self {
            Self::Socializing => deficit(needs.social),
            Self::Resting => deficit(needs.sleep),
            Self::Exploring => deficit(needs.fun),
            // Work pays for food.
            Self::Working => 0.5 * deficit(needs.hunger) + 0.5 * calm,
            Self::Helping => 0.5 * deficit(needs.social) + 0.5 * calm,
            Self::Learning | Self::Planning => calm,
        };
        raw.max(FACTOR_FLOOR)
    }

    /// How much this personality is drawn to the state.
    #[must_use]
    pub fn personality_affinity(self, traits: &TraitVector) -> f32 {
        let t = |x: Trait| traits.get(x);
        let raw = match self {
            Self::Socializing => 0.7 * t(Trait::Friendliness) + 0.3 * t(Trait::Humor),
            Self::Working => 0.5 * t(Trait::Organization) + 0.5 * t(Trait::Ambition),
            Self::Exploring => 0.6 * t(Trait::Curiosity) + 0.4 * t(Trait::Energy),
            Self::Learning => 0.6 * t(Trait::Curiosity) + 0.4 * t(Trait::Creativity),
            Self::Helping => 0.7 * t(Trait::Empathy) + 0.3 * t(Trait::Friendliness),
            Self::Planning => 0.6 * t(Trait::Organization) + 0.4 * t(Trait::Patience),
            Self::Resting => 0.6 * (1.0 - t(Trait::Energy)) + 0.4 * t(Trait::Patience),
        };
        raw.max(FACTOR_FLOOR)
    }
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Socializing => "socializing",
            Self::Working => "working",
            Self::Exploring => "exploring",
            Self::Learning => "learning",
            Self::Helping => "helping",
            Self::Planning => "planning",
            Self::Resting => "resting",
        })
    }
}

// ---------------------------------------------------------------------------
// Learned weights
// ---------------------------------------------------------------------------

/// Per source state, per target state success estimates in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionWeights {
    table: [[f32; BehaviorState::COUNT]; BehaviorState::COUNT],
}

impl TransitionWeights {
    /// Every transition at `initial`.
    #[must_use]
    pub fn uniform(initial: f32) -> Self {
        Self {
            table: [[clamp_unit(initial); BehaviorState::COUNT]; BehaviorState::COUNT],
        }
    }

    /// Learned weight of `from → to`.
    #[must_use]
    pub fn get(&self, from: BehaviorState, to: BehaviorState) -> f32 {
        self.table[from.index()][to.index()]
    }

    /// EMA update toward `outcome`; returns the new weight.
    pub fn update(&mut self, from: BehaviorState, to: BehaviorState, outcome: f32, alpha: f32) -> f32 {
        let slot = &mut self.table[from.index()][to.index()];
        let outcome = clamp_unit(outcome);
        *slot = clamp_unit(*slot + alpha * (outcome - *slot));
        *slot
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// A transition chosen by the planner, remembered until its outcome arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// State before.
    pub from: BehaviorState,
    /// State after.
    pub to: BehaviorState,
}

/// One agent's behavior state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorPlanner {
    current: BehaviorState,
    weights: TransitionWeights,
    pending: Option<Transition>,
}

impl BehaviorPlanner {
    /// Start in the state this personality is most drawn to.
    #[must_use]
    pub fn for_personality(traits: &TraitVector, config: &BehaviorConfig) -> Self {
        let mut best = BehaviorState::Socializing;
        let mut best_score = f32::MIN;
        for state in BehaviorState::ALL {
            let score = state.personality_affinity(traits);
            if score > best_score {
                best = state;
                best_score = score;
            }
        }
        Self {
            current: best,
            weights: TransitionWeights::uniform(config.initial_weight),
            pending: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn current(&self) -> BehaviorState {
        self.current
    }

    /// Learned weights.
    #[must_use]
    pub fn weights(&self) -> &TransitionWeights {
        &self.weights
    }

    /// The transition awaiting an outcome, if any.
    #[must_use]
    pub fn pending(&self) -> Option<Transition> {
        self.pending
    }

    /// Combined sampling weight for every candidate target state.
    #[must_use]
    pub fn candidate_weights(
        &self,
        needs: &Needs,
        traits: &TraitVector,
    ) -> [(BehaviorState, f32); BehaviorState::COUNT] {
        BehaviorState::ALL.map(|to| {
            let learned = self.weights.get(self.current, to).max(FACTOR_FLOOR);
            (to, to.needs_match(needs) * to.personality_affinity(traits) * learned)
        })
    }

    /// Draw the next intended state without committing to it.
    pub fn sample_next<R: Rng + ?Sized>(
        &self,
        needs: &Needs,
        traits: &TraitVector,
        rng: &mut R,
    ) -> BehaviorState {
        let candidates = self.candidate_weights(needs, traits);
        match WeightedIndex::new(candidates.iter().map(|(_, w)| *w)) {
            Ok(dist) => candidates[dist.sample(rng)].0,
            // All factors are floored above zero, so this only happens on
            // NaN input; staying put is the safe answer.
            Err(_) => self.current,
        }
    }

    /// Move to `to` and remember the transition for outcome learning.
    pub fn commit(&mut self, to: BehaviorState) -> Transition {
        let transition = Transition {
            from: self.current,
            to,
        };
        self.current = to;
        self.pending = Some(transition);
        transition
    }

    /// Feed the outcome of the pending transition into the learned weights.
    ///
    /// Returns the updated transition and its new weight, or `None` when
    /// nothing was pending.
    pub fn record_outcome(&mut self, outcome: f32, config: &BehaviorConfig) -> Option<(Transition, f32)> {
        let transition = self.pending.take()?;
        let weight = self
            .weights
            .update(transition.from, transition.to, outcome, config.learning_rate);
        Some((transition, weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config() -> BehaviorConfig {
        BehaviorConfig::default()
    }

    #[test]
    fn initial_state_follows_personality() {
        let social = TraitVector::from_pairs(&[(Trait::Friendliness, 1.0), (Trait::Humor, 1.0)]);
        assert_eq!(
            BehaviorPlanner::for_personality(&social, &config()).current(),
            BehaviorState::Socializing
        );
        let tired = TraitVector::from_pairs(&[(Trait::Energy, 0.0), (Trait::Patience, 1.0)]);
        assert_eq!(
            BehaviorPlanner::for_personality(&tired, &config()).current(),
            BehaviorState::Resting
        );
    }

    #[test]
    fn ema_update_matches_formula() {
        let mut w = TransitionWeights::uniform(0.5);
        let next = w.update(BehaviorState::Working, BehaviorState::Resting, 1.0, 0.1);
        assert!((next - 0.55).abs() < 1e-6);
        let next = w.update(BehaviorState::Working, BehaviorState::Resting, 0.0, 0.1);
        assert!((next - 0.495).abs() < 1e-6);
    }

    #[test]
    fn outcome_only_updates_pending_transition() {
        let mut planner = BehaviorPlanner::for_personality(&TraitVector::default(), &config());
        assert!(planner.record_outcome(1.0, &config()).is_none());
        let from = planner.current();
        planner.commit(BehaviorState::Exploring);
        let (t, w) = planner.record_outcome(1.0, &config()).expect("pending");
        assert_eq!(t.from, from);
        assert_eq!(t.to, BehaviorState::Exploring);
        assert!(w > 0.5);
        assert!(planner.pending().is_none());
    }

    #[test]
    fn sleep_deficit_pulls_toward_resting() {
        let planner = BehaviorPlanner::for_personality(&TraitVector::default(), &config());
        let exhausted = Needs::new(1.0, 0.0, 1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        let resting = (0..500)
            .filter(|_| planner.sample_next(&exhausted, &TraitVector::default(), &mut rng) == BehaviorState::Resting)
            .count();
        assert!(resting > 250, "expected resting to dominate, got {resting}/500");
    }

    #[test]
    fn urgent_need_outweighs_every_other_state() {
        let exhausted = Needs::new(1.0, 0.0, 1.0, 1.0);
        let resting = BehaviorState::Resting.needs_match(&exhausted);
        let others: f32 = BehaviorState::ALL
            .iter()
            .filter(|s| **s != BehaviorState::Resting)
            .map(|s| s.needs_match(&exhausted))
            .sum();
        assert!(resting > others, "resting {resting} vs the rest {others}");

        let starving = Needs::new(0.0, 1.0, 1.0, 1.0);
        assert!(BehaviorState::Working.needs_match(&starving) > BehaviorState::Learning.needs_match(&starving) * 5.0);
    }

    #[test]
    fn content_agent_favors_unhurried_states() {
        let content = Needs::default();
        assert!(BehaviorState::Learning.needs_match(&content) > BehaviorState::Resting.needs_match(&content));
        assert!((BehaviorState::Planning.needs_match(&content) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn learned_weights_shift_sampling() {
        let traits = TraitVector::default();
        let needs = Needs::new(0.5, 0.5, 0.5, 0.5);
        let mut planner = BehaviorPlanner::for_personality(&traits, &config());
        let from = planner.current();
        for _ in 0..60 {
            planner.pending = Some(Transition { from, to: BehaviorState::Learning });
            planner.record_outcome(1.0, &config());
            planner.pending = Some(Transition { from, to: BehaviorState::Planning });
            planner.record_outcome(0.0, &config());
        }
        let weights = planner.candidate_weights(&needs, &traits);
        let learning = weights[BehaviorState::Learning as usize].1;
        let planning = weights[BehaviorState::Planning as usize].1;
        assert!(learning > planning * 5.0);
    }
}
