//! Time-bounded cache of caller group memberships.
//!
//! # Purpose
//! Avoids a group API round-trip for every request from the same caller.
//!
//! # Key invariants
//! - Entries hold the caller's memberships across all organizations; org
//!   scoping happens per request.
//! - Values are stored behind an `Arc` and replaced whole, so a reader sees
//!   either the previous or the new list, never a mix.
//! - Expired entries are dropped lazily on read and by the periodic sweep.
//! - Only successful fetches are stored.
//!
//! # Concurrency model
//! Backed by a sharded `DashMap`; no lock is held across an await point.
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::{CallerId, GroupMembership};

/// Default expiry of a cached membership list.
pub const DEFAULT_MEMBERSHIP_TTL: Duration = Duration::from_secs(300);

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

pub type Memberships = Arc<Vec<GroupMembership>>;

/// Storage capability used by the membership fetcher.
pub trait MembershipCache: Send + Sync {
    fn get(&self, caller_id: &CallerId) -> Option<Memberships>;
    fn set(&self, caller_id: &CallerId, memberships: Memberships, ttl: Duration);
    /// Drop every expired entry, returning how many were removed.
    fn evict_expired(&self) -> usize;
}

/// Time source, replaceable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    memberships: Memberships,
    expires_at: Instant,
}

pub struct TtlMembershipCache {
    entries: DashMap<CallerId, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for TtlMembershipCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlMembershipCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MembershipCache for TtlMembershipCache {
    fn get(&self, caller_id: &CallerId) -> Option<Memberships> {
        let now = self.clock.now();
        // Copy out of the shard guard before any removal to avoid self-deadlock.
        let entry = self.entries.get(caller_id).map(|entry| entry.value().clone())?;
        if now < entry.expires_at {
            return Some(entry.memberships);
        }
        // A concurrent set may have replaced the entry; only drop it if still expired.
        self.entries
            .remove_if(caller_id, |_, entry| now >= entry.expires_at);
        None
    }

    fn set(&self, caller_id: &CallerId, memberships: Memberships, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(
            caller_id.clone(),
            CacheEntry {
                memberships,
                expires_at,
            },
        );
    }

    fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }
}

/// Spawn the periodic expiry sweep.
pub fn spawn_sweeper(
    cache: Arc<dyn MembershipCache>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("membership cache sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = cache.evict_expired();
                    if evicted > 0 {
                        metrics::counter!("lbac_membership_cache_evicted_total")
                            .increment(evicted as u64);
                        tracing::debug!(evicted, "membership cache sweep");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Instant::now()),
            })
        }

        fn advance(&self, by: Duration) {
            *self.now.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock()
        }
    }

    fn teams(names: &[(i64, &str)]) -> Memberships {
        Arc::new(
            names
                .iter()
                .enumerate()
                .map(|(idx, (org, name))| GroupMembership::new(idx as i64, *org, *name))
                .collect(),
        )
    }

    #[test]
    fn get_returns_value_until_expiry() {
        let clock = ManualClock::new();
        let cache = TtlMembershipCache::with_clock(clock.clone());
        let caller = CallerId::new("42");
        cache.set(&caller, teams(&[(7, "team-a")]), Duration::from_secs(300));

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get(&caller).expect("hit")[0].name, "team-a");

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&caller).is_none());
        assert!(cache.is_empty(), "expired entry is dropped on read");
    }

    #[test]
    fn set_overwrites_previous_value() {
        let clock = ManualClock::new();
        let cache = TtlMembershipCache::with_clock(clock.clone());
        let caller = CallerId::new("42");
        cache.set(&caller, teams(&[(7, "team-a")]), Duration::from_secs(10));
        cache.set(&caller, teams(&[(3, "team-c")]), Duration::from_secs(10));

        let hit = cache.get(&caller).expect("hit");
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "team-c");
    }

    #[test]
    fn evict_expired_removes_only_stale_entries() {
        let clock = ManualClock::new();
        let cache = TtlMembershipCache::with_clock(clock.clone());
        cache.set(&CallerId::new("1"), teams(&[(1, "a")]), Duration::from_secs(5));
        cache.set(&CallerId::new("2"), teams(&[(1, "b")]), Duration::from_secs(60));

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CallerId::new("2")).is_some());
    }

    #[test]
    fn concurrent_readers_never_see_torn_values() {
        let cache = Arc::new(TtlMembershipCache::new());
        let caller = CallerId::new("42");
        let first = teams(&[(7, "a"), (7, "a")]);
        let second = teams(&[(7, "b"), (7, "b")]);
        cache.set(&caller, first.clone(), Duration::from_secs(60));

        let writer = {
            let cache = cache.clone();
            let caller = caller.clone();
            std::thread::spawn(move || {
                for idx in 0..1_000 {
                    let value = if idx % 2 == 0 { &second } else { &first };
                    cache.set(&caller, value.clone(), Duration::from_secs(60));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let caller = caller.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let hit = cache.get(&caller).expect("hit");
                        assert_eq!(hit[0].name, hit[1].name);
                    }
                })
            })
            .collect();

        writer.join().expect("writer");
        for reader in readers {
            reader.join().expect("reader");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_until_cancelled() {
        let clock = ManualClock::new();
        let cache = Arc::new(TtlMembershipCache::with_clock(clock.clone()));
        cache.set(&CallerId::new("1"), teams(&[(1, "a")]), Duration::from_secs(5));
        clock.advance(Duration::from_secs(10));

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(cache.clone(), Duration::from_secs(600), cancel.clone());
        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(cache.is_empty());

        cancel.cancel();
        handle.await.expect("join");
    }
}
