//! Runtime counters and decision latency tracking.
//!
//! Counters are lock-free `AtomicU64`s bumped on the hot path and read on
//! export. Latency samples go into a fixed ring guarded by a
//! `parking_lot::Mutex`; reads are rare (dashboard export).

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Atomic counters for engine events.
#[derive(Debug, Default)]
pub struct EngineCounters {
    /// Terminal decision cycles (one per emitted decision record).
    pub decisions: AtomicU64,
    /// Decisions served from the fingerprint cache.
    pub cache_hits: AtomicU64,
    /// Decisions that waited on another in-flight computation.
    pub coalesced: AtomicU64,
    /// Tier attempts that produced an accepted response.
    pub tier_success: AtomicU64,
    /// Tier attempts abandoned at their deadline.
    pub tier_timeouts: AtomicU64,
    /// Tier attempts that failed in transport (or were skipped as disabled).
    pub tier_transport_errors: AtomicU64,
    /// Tier attempts whose response failed validation.
    pub tier_malformed: AtomicU64,
    /// Decisions produced by the deterministic rule tier.
    pub rule_fallbacks: AtomicU64,
    /// Due cycles skipped because the agent already had one in flight.
    pub deferred: AtomicU64,
    /// Memory records written.
    pub memory_writes: AtomicU64,
    /// Memory writes that failed.
    pub memory_write_failures: AtomicU64,
    /// Retrievals that failed and fell back to an empty set.
    pub memory_read_failures: AtomicU64,
    /// Records evicted by the retention cap.
    pub evictions: AtomicU64,
}

impl EngineCounters {
    /// Zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            decisions: load(&self.decisions),
            cache_hits: load(&self.cache_hits),
            coalesced: load(&self.coalesced),
            tier_success: load(&self.tier_success),
            tier_timeouts: load(&self.tier_timeouts),
            tier_transport_errors: load(&self.tier_transport_errors),
            tier_malformed: load(&self.tier_malformed),
            rule_fallbacks: load(&self.rule_fallbacks),
            deferred: load(&self.deferred),
            memory_writes: load(&self.memory_writes),
            memory_write_failures: load(&self.memory_write_failures),
            memory_read_failures: load(&self.memory_read_failures),
            evictions: load(&self.evictions),
        }
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct CounterSnapshot {
    pub decisions: u64,
    pub cache_hits: u64,
    pub coalesced: u64,
    pub tier_success: u64,
    pub tier_timeouts: u64,
    pub tier_transport_errors: u64,
    pub tier_malformed: u64,
    pub rule_fallbacks: u64,
    pub deferred: u64,
    pub memory_writes: u64,
    pub memory_write_failures: u64,
    pub memory_read_failures: u64,
    pub evictions: u64,
}

impl CounterSnapshot {
    fn entries(&self) -> [(&'static str, &'static str, u64); 13] {
        [
            ("decisions_total", "Completed decision cycles", self.decisions),
            ("cache_hits_total", "Decisions served from cache", self.cache_hits),
            ("coalesced_total", "Decisions that joined an in-flight computation", self.coalesced),
            ("tier_success_total", "Accepted tier responses", self.tier_success),
            ("tier_timeouts_total", "Tier attempts abandoned at deadline", self.tier_timeouts),
            ("tier_transport_errors_total", "Tier transport failures", self.tier_transport_errors),
            ("tier_malformed_total", "Tier responses failing validation", self.tier_malformed),
            ("rule_fallbacks_total", "Decisions from the rule tier", self.rule_fallbacks),
            ("deferred_total", "Due cycles deferred by pacing", self.deferred),
            ("memory_writes_total", "Memory records written", self.memory_writes),
            ("memory_write_failures_total", "Failed memory writes", self.memory_write_failures),
            ("memory_read_failures_total", "Failed memory retrievals", self.memory_read_failures),
            ("evictions_total", "Records evicted by retention cap", self.evictions),
        ]
    }

    /// Prometheus text exposition format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let mut out = String::with_capacity(2048);
        for (name, help, value) in self.entries() {
            let _ = writeln!(out, "# HELP npcmind_{name} {help}");
            let _ = writeln!(out, "# TYPE npcmind_{name} counter");
            let _ = writeln!(out, "npcmind_{name} {value}");
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Latency
// ---------------------------------------------------------------------------

const LATENCY_WINDOW: usize = 256;

/// Rolling window of decision latencies.
#[derive(Debug)]
pub struct LatencyTracker {
    samples: Mutex<LatencyRing>,
}

#[derive(Debug)]
struct LatencyRing {
    ms: Vec<f64>,
    write_idx: usize,
    count: u64,
}

/// Percentiles over the current window, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyPercentiles {
    /// Median.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// Worst sample in the window.
    pub max: f64,
    /// Total samples ever recorded.
    pub count: u64,
}

impl LatencyTracker {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(LatencyRing {
                ms: vec![0.0; LATENCY_WINDOW],
                write_idx: 0,
                count: 0,
            }),
        }
    }

    /// Record one sample.
    pub fn record(&self, latency: Duration) {
        let mut ring = self.samples.lock();
        let idx = ring.write_idx;
        ring.ms[idx] = latency.as_secs_f64() * 1000.0;
        ring.write_idx = (idx + 1) % LATENCY_WINDOW;
        ring.count += 1;
    }

    /// Percentiles over the samples currently in the window.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn percentiles(&self) -> LatencyPercentiles {
        let ring = self.samples.lock();
        let n = usize::try_from(ring.count).unwrap_or(usize::MAX).min(LATENCY_WINDOW);
        if n == 0 {
            return LatencyPercentiles::default();
        }
        let mut sorted = ring.ms[..n].to_vec();
        sorted.sort_by(f64::total_cmp);
        LatencyPercentiles {
            p50: sorted[n / 2],
            p95: sorted[((n as f64 * 0.95) as usize).min(n - 1)],
            max: sorted[n - 1],
            count: ring.count,
        }
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Span names shared by the engine's instrumentation.
pub mod spans {
    /// One full decision cycle.
    pub const DECIDE: &str = "npcmind::decide";
    /// Memory write.
    pub const MEMORY_WRITE: &str = "npcmind::memory::write";
    /// Memory retrieval.
    pub const MEMORY_RETRIEVE: &str = "npcmind::memory::retrieve";
    /// Emotional contagion tick.
    pub const CONTAGION: &str = "npcmind::contagion";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_bumps() {
        let c = EngineCounters::new();
        EngineCounters::bump(&c.decisions);
        EngineCounters::bump(&c.decisions);
        EngineCounters::add(&c.evictions, 5);
        let s = c.snapshot();
        assert_eq!(s.decisions, 2);
        assert_eq!(s.evictions, 5);
        assert_eq!(s.cache_hits, 0);
    }

    #[test]
    fn prometheus_output_has_every_counter() {
        let c = EngineCounters::new();
        EngineCounters::bump(&c.rule_fallbacks);
        let text = c.snapshot().to_prometheus();
        assert!(text.contains("# TYPE npcmind_decisions_total counter"));
        assert!(text.contains("npcmind_rule_fallbacks_total 1"));
        assert_eq!(text.lines().filter(|l| l.starts_with("npcmind_")).count(), 13);
    }

    #[test]
    fn latency_percentiles_over_window() {
        let t = LatencyTracker::new();
        assert_eq!(t.percentiles().count, 0);
        for ms in 1..=100 {
            t.record(Duration::from_millis(ms));
        }
        let p = t.percentiles();
        assert_eq!(p.count, 100);
        assert!((p.max - 100.0).abs() < 1e-9);
        assert!(p.p50 >= 50.0 && p.p50 <= 51.0);
    }

    #[test]
    fn latency_ring_wraps() {
        let t = LatencyTracker::new();
        for _ in 0..(LATENCY_WINDOW * 2) {
            t.record(Duration::from_millis(3));
        }
        let p = t.percentiles();
        assert_eq!(p.count, (LATENCY_WINDOW * 2) as u64);
        assert!((p.max - 3.0).abs() < 1e-9);
    }
}
