//! Fingerprint cache with per-key request coalescing.
//!
//! Two maps cooperate:
//!
//! - `ready`: an LRU of finished values with their insertion time; entries
//!   older than the TTL are treated as absent.
//! - `in_flight`: fingerprint → shared `OnceCell` of a computation that has
//!   started but not finished.
//!
//! Every caller for a missing key joins the same cell and calls
//! `get_or_init` with its own closure; tokio runs exactly one of them. If
//! the running caller is dropped mid-computation, the next waiter's closure
//! takes over, so a cancelled leader never strands its followers.
//!
//! The finishing caller publishes to `ready` before it removes the
//! in-flight entry, and a new leader re-checks `ready` while holding the
//! in-flight shard lock. Together these close the window in which a late
//! arrival could start a duplicate computation.

use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio::time::Instant;

/// How a value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Fresh entry in the cache.
    Hit,
    /// Waited for another caller's computation.
    Coalesced,
    /// This caller ran the computation.
    Computed,
}

impl CacheSource {
    /// Whether the caller got someone else's result.
    #[must_use]
    pub fn is_cached(self) -> bool {
        !matches!(self, Self::Computed)
    }
}

/// TTL cache whose misses coalesce per key.
pub struct CoalescingCache<K, V> {
    ready: Mutex<LruCache<K, (V, Instant)>>,
    in_flight: DashMap<K, Arc<OnceCell<V>>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V> std::fmt::Debug for CoalescingCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingCache")
            .field("ttl", &self.ttl)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl<K, V> CoalescingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Cache holding at most `capacity` finished values for `ttl`.
    #[must_use]
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            ready: Mutex::new(LruCache::new(capacity)),
            in_flight: DashMap::new(),
            ttl,
        }
    }

    fn fresh(&self, key: &K) -> Option<V> {
        let mut ready = self.ready.lock();
        let expired = match ready.get(key) {
            Some((value, at)) if at.elapsed() < self.ttl => return Some(value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            ready.pop(key);
        }
        None
    }

    /// Return the cached value for `key`, or join/run the computation.
    pub async fn get_or_compute<F, Fut>(&self, key: &K, compute: F) -> (V, CacheSource)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.fresh(key) {
            return (value, CacheSource::Hit);
        }

        let cell = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                if let Some(value) = self.fresh(key) {
                    return (value, CacheSource::Hit);
                }
                Arc::clone(entry.insert(Arc::new(OnceCell::new())).value())
            }
        };

        let ran = AtomicBool::new(false);
        let value = cell
            .get_or_init(|| {
                let ran = &ran;
                async move {
                    ran.store(true, Ordering::Relaxed);
                    compute().await
                }
            })
            .await
            .clone();

        if ran.load(Ordering::Relaxed) {
            self.ready.lock().put(key.clone(), (value.clone(), Instant::now()));
            self.in_flight.remove_if(key, |_, current| Arc::ptr_eq(current, &cell));
            (value, CacheSource::Computed)
        } else {
            (value, CacheSource::Coalesced)
        }
    }

    /// Finished entries currently held, including expired ones not yet
    /// pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ready.lock().len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Computations currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop every finished entry.
    pub fn clear(&self) {
        self.ready.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn cache(ttl_secs: u64) -> CoalescingCache<&'static str, u32> {
        CoalescingCache::new(NonZeroUsize::new(8).expect("non-zero"), Duration::from_secs(ttl_secs))
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_hits() {
        let cache = cache(60);
        let (v, src) = cache.get_or_compute(&"k", || async { 7 }).await;
        assert_eq!((v, src), (7, CacheSource::Computed));
        let (v, src) = cache.get_or_compute(&"k", || async { 8 }).await;
        assert_eq!((v, src), (7, CacheSource::Hit));
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire() {
        let cache = cache(10);
        cache.get_or_compute(&"k", || async { 1 }).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        let (v, src) = cache.get_or_compute(&"k", || async { 2 }).await;
        assert_eq!((v, src), (2, CacheSource::Computed));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_run_once() {
        let cache = Arc::new(cache(60));
        let calls = Arc::new(AtomicU32::new(0));

        let run = |cache: Arc<CoalescingCache<&'static str, u32>>, calls: Arc<AtomicU32>| async move {
            cache
                .get_or_compute(&"k", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    42
                })
                .await
        };

        let (a, b) = tokio::join!(
            run(Arc::clone(&cache), Arc::clone(&calls)),
            run(Arc::clone(&cache), Arc::clone(&calls))
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, (42, CacheSource::Computed));
        assert_eq!(b, (42, CacheSource::Coalesced));
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_do_not_coalesce() {
        let cache = cache(60);
        let (a, b) = tokio::join!(
            cache.get_or_compute(&"a", || async { 1 }),
            cache.get_or_compute(&"b", || async { 2 })
        );
        assert_eq!(a, (1, CacheSource::Computed));
        assert_eq!(b, (2, CacheSource::Computed));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn debug_reports_in_flight_count() {
        let cache = cache(60);
        cache.get_or_compute(&"k", || async { 1 }).await;
        let shown = format!("{cache:?}");
        assert!(shown.starts_with("CoalescingCache"));
        assert!(shown.contains("in_flight: 0"), "{shown}");
    }

    #[test]
    fn cached_flag() {
        assert!(CacheSource::Hit.is_cached());
        assert!(CacheSource::Coalesced.is_cached());
        assert!(!CacheSource::Computed.is_cached());
    }
}
