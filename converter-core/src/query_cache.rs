//! Keyed query cache with staleness and in-flight de-duplication.
//!
//! Each key owns one slot: either a call in flight or a settled result.
//! At most one call per key is outstanding; concurrent callers join it.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Caching and retry behaviour for one kind of query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Age after which a successful result is fetched again.
    pub stale_time: Duration,
    /// Extra attempts after a failed call. Zero makes the first failure final.
    pub retry: u32,
}

impl QueryOptions {
    pub const fn new(stale_time: Duration, retry: u32) -> Self {
        Self { stale_time, retry }
    }
}

/// Backoff before retry number `attempt` (0-based): 1s, 2s, 4s, ... capped at 30s.
pub fn retry_delay(attempt: u32) -> Duration {
    let millis = 1_000u64.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(millis.min(30_000))
}

/// Lifecycle of a cached query as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// Point-in-time view of one cache slot.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot<V, E> {
    pub status: QueryStatus,
    pub result: Option<Result<V, E>>,
    pub updated_at: Option<DateTime<Utc>>,
}

type Published<V, E> = Option<Result<V, E>>;

enum Slot<V, E> {
    InFlight {
        generation: u64,
        rx: watch::Receiver<Published<V, E>>,
    },
    Settled(Settled<V, E>),
}

struct Settled<V, E> {
    result: Result<V, E>,
    updated_at: DateTime<Utc>,
    settled_at: Instant,
}

impl<V, E> Settled<V, E> {
    // Errors are never fresh.
    fn is_fresh(&self, stale_time: Duration) -> bool {
        self.result.is_ok() && self.settled_at.elapsed() < stale_time
    }
}

enum Plan<V, E> {
    Hit(Result<V, E>),
    Join(watch::Receiver<Published<V, E>>),
    Lead {
        generation: u64,
        tx: watch::Sender<Published<V, E>>,
    },
}

/// Thread-safe keyed cache of query results.
pub struct QueryCache<K, V, E>
where
    K: Eq + Hash,
{
    slots: DashMap<K, Slot<V, E>>,
    generation: AtomicU64,
}

impl<K, V, E> Default for QueryCache<K, V, E>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> QueryCache<K, V, E>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the result for `key`, calling `fetcher` only when needed.
    ///
    /// A fresh successful result is served from the cache. A call already in
    /// flight for `key` is joined instead of duplicated. Otherwise `fetcher`
    /// runs, with up to `options.retry` extra attempts on failure.
    pub async fn fetch<F, Fut>(&self, key: K, options: QueryOptions, fetcher: F) -> Result<V, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        loop {
            match self.plan(&key, options) {
                Plan::Hit(result) => return result,
                Plan::Join(mut rx) => {
                    let joined = match rx.wait_for(Option::is_some).await {
                        Ok(published) => (*published).clone(),
                        Err(_) => None,
                    };
                    if let Some(result) = joined {
                        return result;
                    }
                    debug!(?key, "in-flight query abandoned, retrying");
                }
                Plan::Lead { generation, tx } => {
                    let mut guard = InFlightGuard {
                        slots: &self.slots,
                        key: &key,
                        generation,
                        armed: true,
                    };
                    let result = run_with_retry(&fetcher, options.retry).await;
                    guard.armed = false;

                    self.settle(&key, generation, result.clone());
                    tx.send_replace(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    fn plan(&self, key: &K, options: QueryOptions) -> Plan<V, E> {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                match occupied.get() {
                    Slot::Settled(settled) if settled.is_fresh(options.stale_time) => {
                        debug!(?key, "query cache hit");
                        return Plan::Hit(settled.result.clone());
                    }
                    Slot::InFlight { rx, .. } => {
                        debug!(?key, "joining in-flight query");
                        return Plan::Join(rx.clone());
                    }
                    Slot::Settled(_) => {}
                }
                debug!(?key, "query stale, refetching");
                let (generation, tx, rx) = self.begin();
                occupied.insert(Slot::InFlight { generation, rx });
                Plan::Lead { generation, tx }
            }
            Entry::Vacant(vacant) => {
                debug!(?key, "query cache miss");
                let (generation, tx, rx) = self.begin();
                vacant.insert(Slot::InFlight { generation, rx });
                Plan::Lead { generation, tx }
            }
        }
    }

    fn begin(
        &self,
    ) -> (
        u64,
        watch::Sender<Published<V, E>>,
        watch::Receiver<Published<V, E>>,
    ) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        (generation, tx, rx)
    }

    // Only the leader that owns the in-flight slot may settle it; a slot
    // that was evicted or taken over in the meantime is left alone.
    fn settle(&self, key: &K, generation: u64, result: Result<V, E>) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            if matches!(*slot, Slot::InFlight { generation: g, .. } if g == generation) {
                *slot = Slot::Settled(Settled {
                    result,
                    updated_at: Utc::now(),
                    settled_at: Instant::now(),
                });
            }
        }
    }

    /// Current state of `key`, if the cache holds anything for it.
    pub fn snapshot(&self, key: &K) -> Option<QuerySnapshot<V, E>> {
        self.slots.get(key).map(|slot| match &*slot {
            Slot::InFlight { .. } => QuerySnapshot {
                status: QueryStatus::Pending,
                result: None,
                updated_at: None,
            },
            Slot::Settled(settled) => QuerySnapshot {
                status: if settled.result.is_ok() {
                    QueryStatus::Success
                } else {
                    QueryStatus::Error
                },
                result: Some(settled.result.clone()),
                updated_at: Some(settled.updated_at),
            },
        })
    }

    /// Drops the settled result for `key` so the next fetch goes upstream.
    pub fn invalidate(&self, key: &K) {
        self.slots
            .remove_if(key, |_, slot| matches!(slot, Slot::Settled(_)));
    }

    /// Keeps settled entries whose key satisfies `keep`. In-flight slots always stay.
    pub fn retain_settled(&self, mut keep: impl FnMut(&K) -> bool) {
        self.slots
            .retain(|key, slot| matches!(slot, Slot::InFlight { .. }) || keep(key));
    }

    /// Drops every entry. Leaders still in flight finish without settling.
    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

async fn run_with_retry<F, Fut, V, E>(fetcher: &F, retry: u32) -> Result<V, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    let mut attempt = 0;
    loop {
        match fetcher().await {
            Ok(value) => return Ok(value),
            Err(_) if attempt < retry => {
                let delay = retry_delay(attempt);
                debug!(attempt = attempt + 1, ?delay, "query failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Clears the leader's in-flight slot if its fetch is dropped before settling.
struct InFlightGuard<'a, K, V, E>
where
    K: Eq + Hash,
{
    slots: &'a DashMap<K, Slot<V, E>>,
    key: &'a K,
    generation: u64,
    armed: bool,
}

impl<K, V, E> Drop for InFlightGuard<'_, K, V, E>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let generation = self.generation;
        self.slots.remove_if(self.key, |_, slot| {
            matches!(slot, Slot::InFlight { generation: g, .. } if *g == generation)
        });
    }
}
