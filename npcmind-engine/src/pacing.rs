//! Per-agent decision pacing.
//!
//! An agent has at most one decision in flight. A cycle that comes due
//! while another is running is deferred, not queued: the running cycle
//! finishes and the next one is computed later from then-current state.
//! After each cycle the agent's next due time is drawn uniformly from the
//! configured cooldown range, which spreads agents out and avoids
//! synchronized decision storms.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use npcmind_core::AgentId;
use rand::Rng;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct PaceState {
    in_flight: bool,
    next_due: Option<Instant>,
}

/// Result of asking whether an agent may start a cycle.
#[derive(Debug)]
pub enum PaceCheck {
    /// Go ahead; the slot is released when the guard drops.
    Due(PaceGuard),
    /// Cooldown has not elapsed.
    NotDue,
    /// A cycle is already running for this agent.
    Deferred,
}

/// Cooldown bookkeeping for every agent.
#[derive(Debug)]
pub struct Pacer {
    slots: DashMap<AgentId, PaceState>,
    min: Duration,
    max: Duration,
}

impl Pacer {
    /// Pacer drawing cooldowns from `[min_secs, max_secs]`.
    ///
    /// Values a `Duration` cannot hold count as zero; configuration
    /// validation rejects them before an engine gets here.
    #[must_use]
    pub fn new(min_secs: f32, max_secs: f32) -> Self {
        let secs = |s: f32| Duration::try_from_secs_f32(s.max(0.0)).unwrap_or(Duration::ZERO);
        let min = secs(min_secs);
        let max = secs(max_secs).max(min);
        Self {
            slots: DashMap::new(),
            min,
            max,
        }
    }

    /// Claim the agent's slot if it is due and idle.
    pub fn try_begin<R: Rng + ?Sized>(self: &Arc<Self>, agent: &AgentId, rng: &mut R) -> PaceCheck {
        let now = Instant::now();
        let mut slot = self.slots.entry(agent.clone()).or_default();
        if slot.in_flight {
            return PaceCheck::Deferred;
        }
        if slot.next_due.is_some_and(|due| now < due) {
            return PaceCheck::NotDue;
        }
        slot.in_flight = true;
        PaceCheck::Due(PaceGuard {
            pacer: Arc::clone(self),
            agent: agent.clone(),
            cooldown: self.draw_cooldown(rng),
        })
    }

    /// Whether a cycle is currently running for `agent`.
    #[must_use]
    pub fn is_in_flight(&self, agent: &AgentId) -> bool {
        self.slots.get(agent).is_some_and(|s| s.in_flight)
    }

    /// When `agent` is next due, if it has run before.
    #[must_use]
    pub fn next_due(&self, agent: &AgentId) -> Option<Instant> {
        self.slots.get(agent).and_then(|s| s.next_due)
    }

    fn draw_cooldown<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        Duration::from_secs_f64(rng.gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64()))
    }

    fn finish(&self, agent: &AgentId, cooldown: Duration) {
        if let Some(mut slot) = self.slots.get_mut(agent) {
            slot.in_flight = false;
            slot.next_due = Some(Instant::now() + cooldown);
        }
    }
}

/// Held while an agent's cycle runs.
#[derive(Debug)]
pub struct PaceGuard {
    pacer: Arc<Pacer>,
    agent: AgentId,
    cooldown: Duration,
}

impl PaceGuard {
    /// Cooldown that starts when this guard drops.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Drop for PaceGuard {
    fn drop(&mut self) {
        self.pacer.finish(&self.agent, self.cooldown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[tokio::test(start_paused = true)]
    async fn second_claim_is_deferred() {
        let pacer = Arc::new(Pacer::new(10.0, 20.0));
        let mut rng = StdRng::seed_from_u64(1);
        let a = AgentId::new("A");

        let guard = match pacer.try_begin(&a, &mut rng) {
            PaceCheck::Due(g) => g,
            other => panic!("expected due, got {other:?}"),
        };
        assert!(pacer.is_in_flight(&a));
        assert!(matches!(pacer.try_begin(&a, &mut rng), PaceCheck::Deferred));
        drop(guard);
        assert!(!pacer.is_in_flight(&a));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_is_within_range() {
        let pacer = Arc::new(Pacer::new(10.0, 20.0));
        let mut rng = StdRng::seed_from_u64(2);
        let a = AgentId::new("A");

        let PaceCheck::Due(guard) = pacer.try_begin(&a, &mut rng) else {
            panic!("first claim is due");
        };
        let cooldown = guard.cooldown();
        assert!(cooldown >= Duration::from_secs(10) && cooldown <= Duration::from_secs(20));
        drop(guard);

        assert!(matches!(pacer.try_begin(&a, &mut rng), PaceCheck::NotDue));
        tokio::time::advance(cooldown + Duration::from_millis(1)).await;
        assert!(matches!(pacer.try_begin(&a, &mut rng), PaceCheck::Due(_)));
    }

    #[test]
    fn cooldowns_vary() {
        let pacer = Pacer::new(10.0, 20.0);
        let mut rng = StdRng::seed_from_u64(3);
        let draws: Vec<Duration> = (0..8).map(|_| pacer.draw_cooldown(&mut rng)).collect();
        assert!(draws.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn agents_are_independent() {
        let pacer = Arc::new(Pacer::new(1.0, 1.0));
        let mut rng = StdRng::seed_from_u64(4);
        let _a = pacer.try_begin(&AgentId::new("A"), &mut rng);
        assert!(matches!(pacer.try_begin(&AgentId::new("B"), &mut rng), PaceCheck::Due(_)));
    }

    #[test]
    fn unrepresentable_bounds_do_not_panic() {
        let pacer = Pacer::new(f32::NAN, f32::INFINITY);
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(pacer.draw_cooldown(&mut rng), Duration::ZERO);
    }
}
