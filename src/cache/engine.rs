//! Cache Engine Module
//!
//! Keyed async response cache combining TTL freshness, request coalescing,
//! stale-while-revalidate, auto-refresh subscriptions and LFU eviction.
//!
//! All bookkeeping happens inside short critical sections on a single mutex
//! that is never held across an `.await`. Checking for an in-flight fetch and
//! registering a new one therefore happen atomically, which is what
//! guarantees at most one outstanding fetch per key.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use regex::Regex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::size::{json_estimator, SizeEstimator};
use crate::cache::{CacheEntry, CacheStats, EntryInfo, LfuPolicy, RefreshStream};
use crate::config::{CacheConfig, EngineConfig};
use crate::error::{CacheError, Result};

// == Bounds ==
/// Values the engine can cache.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> CacheValue for T {}

/// Errors a fetcher may fail with.
///
/// Coalesced waiters share one failure, hence `Clone`. `From<CacheError>`
/// lets the engine report its own failures (empty key, panicking fetcher)
/// through the caller's error type.
pub trait FetchError: Clone + Display + From<CacheError> + Send + Sync + 'static {}

impl<T: Clone + Display + From<CacheError> + Send + Sync + 'static> FetchError for T {}

type SharedFetch<V, E> = Shared<BoxFuture<'static, std::result::Result<V, E>>>;

type BoxFetcher<V, E> =
    Box<dyn FnOnce() -> BoxFuture<'static, std::result::Result<V, E>> + Send>;

// == In-Flight Request ==
struct InFlight<V, E> {
    /// Distinguishes this fetch from a later one for the same key
    id: u64,
    future: SharedFetch<V, E>,
    waiters: usize,
}

// == Auto-Refresh Subscription ==
struct Refresher<V> {
    sender: watch::Sender<Option<V>>,
    timer: Option<JoinHandle<()>>,
}

impl<V> Refresher<V> {
    fn shutdown(self) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
    }
}

struct State<V, E> {
    entries: HashMap<String, CacheEntry<V>>,
    in_flight: HashMap<String, InFlight<V, E>>,
    refreshers: HashMap<String, Refresher<V>>,
    stats: CacheStats,
    next_seq: u64,
    next_flight: u64,
}

struct Inner<V, E> {
    state: Mutex<State<V, E>>,
    config: EngineConfig,
    estimator: SizeEstimator<V>,
}

enum Lookup<V, E> {
    Ready(V),
    Pending(SharedFetch<V, E>),
}

// == Preload Item ==
/// One `(key, fetcher, config)` triple for [`CacheEngine::preload_bulk`].
pub struct PreloadItem<V, E> {
    pub key: String,
    pub config: Option<CacheConfig>,
    fetcher: BoxFetcher<V, E>,
}

impl<V: CacheValue, E: FetchError> PreloadItem<V, E> {
    pub fn new<F, Fut>(key: impl Into<String>, fetcher: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        Self {
            key: key.into(),
            config: None,
            fetcher: Box::new(move || fetcher().boxed()),
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = Some(config);
        self
    }
}

// == Cache Engine ==
/// Shared handle to one cache; clones refer to the same entries.
///
/// Create one engine per logical cache domain and hand clones to the
/// data-access services that use it.
pub struct CacheEngine<V, E> {
    inner: Arc<Inner<V, E>>,
}

impl<V, E> Clone for CacheEngine<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> CacheEngine<V, E>
where
    V: CacheValue + Serialize,
    E: FetchError,
{
    // == Constructor ==
    /// Creates an engine that sizes values by their JSON encoding.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_size_estimator(config, json_estimator())
    }
}

impl<V, E> CacheEngine<V, E>
where
    V: CacheValue,
    E: FetchError,
{
    /// Creates an engine with a custom size estimator.
    pub fn with_size_estimator(config: EngineConfig, estimator: SizeEstimator<V>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    in_flight: HashMap::new(),
                    refreshers: HashMap::new(),
                    stats: CacheStats::new(),
                    next_seq: 0,
                    next_flight: 0,
                }),
                config,
                estimator,
            }),
        }
    }

    /// Engine-wide configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // == Get ==
    /// Returns the value for `key`, fetching it with the engine defaults if needed.
    pub async fn get<F, Fut>(&self, key: &str, fetcher: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        let config = self.inner.config.defaults.clone();
        self.get_with_config(key, &config, fetcher).await
    }

    /// Returns the value for `key` under an explicit config.
    ///
    /// In order of precedence:
    /// 1. a fresh entry is returned and its hit count incremented
    /// 2. with `stale_while_revalidate`, an expired entry is returned and a
    ///    background fetch is started unless one is already running
    /// 3. a fetch already in flight for `key` is joined
    /// 4. a new fetch is started and awaited
    ///
    /// Fetches run on the tokio runtime to completion even if every waiter
    /// goes away. Failures reach every waiter and leave no entry behind.
    pub async fn get_with_config<F, Fut>(
        &self,
        key: &str,
        config: &CacheConfig,
        fetcher: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        match self.lookup(key, config, fetcher)? {
            Lookup::Ready(value) => Ok(value),
            Lookup::Pending(fetch) => fetch.await,
        }
    }

    fn lookup<F, Fut>(&self, key: &str, config: &CacheConfig, fetcher: F) -> Result<Lookup<V, E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        let now = Instant::now();
        let mut guard = self.inner.lock();
        let state = &mut *guard;

        if let Some(entry) = state.entries.get_mut(key) {
            if entry.is_fresh(now) {
                entry.record_hit();
                state.stats.record_hit();
                debug!(key, hits = entry.hit_count, "cache hit");
                return Ok(Lookup::Ready(entry.value.clone()));
            }

            if config.stale_while_revalidate {
                let value = entry.value.clone();
                state.stats.record_stale_hit();
                if !state.in_flight.contains_key(key) {
                    debug!(key, "serving stale value while revalidating");
                    // Settles on its own; failures are logged by `settle`
                    let _ = Inner::start_fetch(&self.inner, state, key, config, fetcher, 0);
                }
                return Ok(Lookup::Ready(value));
            }
        }

        if let Some(flight) = state.in_flight.get_mut(key) {
            flight.waiters += 1;
            state.stats.record_coalesced();
            debug!(key, waiters = flight.waiters, "joining in-flight fetch");
            return Ok(Lookup::Pending(flight.future.clone()));
        }

        state.stats.record_miss();
        debug!(key, "cache miss, fetching");
        let fetch = Inner::start_fetch(&self.inner, state, key, config, fetcher, 1);
        Ok(Lookup::Pending(fetch))
    }

    // == Auto Refresh ==
    /// Subscribes to the latest value for `key`.
    ///
    /// The first subscription performs an initial `get` and publishes its
    /// result. With `refresh_interval` set, a single timer per key calls the
    /// fetcher directly on every tick, bypassing freshness and coalescing,
    /// overwrites the entry and republishes. Later subscribers share the same
    /// channel and timer; the timer stops once all of them are dropped.
    ///
    /// Joining a subscription whose initial fetch failed retries that fetch
    /// with the joining caller's fetcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_with_auto_refresh<F, Fut>(
        &self,
        key: &str,
        config: &CacheConfig,
        fetcher: F,
    ) -> Result<RefreshStream<V>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let pruned = Inner::prune_refreshers(state);
        if pruned > 0 {
            debug!(pruned, "dropped unobserved auto-refresh subscriptions");
        }

        if let Some(refresher) = state.refreshers.get(key) {
            let receiver = refresher.sender.subscribe();
            let retry = receiver.borrow().is_none() && !state.in_flight.contains_key(key);
            drop(guard);

            if retry {
                debug!(key, "retrying initial auto-refresh fetch");
                self.spawn_initial_get(key, config, Arc::new(fetcher));
            } else {
                debug!(key, "joining auto-refresh subscription");
            }
            return Ok(RefreshStream::new(key, receiver));
        }

        let fetcher = Arc::new(fetcher);
        let (sender, receiver) = watch::channel(None);
        let timer = config.refresh_interval.map(|period| {
            spawn_refresh_timer(
                Arc::downgrade(&self.inner),
                key.to_string(),
                config.clone(),
                period,
                Arc::clone(&fetcher),
            )
        });
        state
            .refreshers
            .insert(key.to_string(), Refresher { sender, timer });
        drop(guard);

        self.spawn_initial_get(key, config, fetcher);
        Ok(RefreshStream::new(key, receiver))
    }

    /// Runs a regular `get` for `key` and publishes its result to subscribers.
    fn spawn_initial_get<F, Fut>(&self, key: &str, config: &CacheConfig, fetcher: Arc<F>)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        let engine = self.clone();
        let owned_key = key.to_string();
        let config = config.clone();
        tokio::spawn(async move {
            let initial = move || (*fetcher)();
            match engine.get_with_config(&owned_key, &config, initial).await {
                Ok(value) => engine.inner.publish_initial(&owned_key, value),
                Err(err) => {
                    warn!(key = %owned_key, error = %err, "initial auto-refresh fetch failed")
                }
            }
        });
    }

    /// Ends the auto-refresh subscription for `key`, closing its streams.
    pub fn stop_auto_refresh(&self, key: &str) -> bool {
        let removed = self.inner.lock().refreshers.remove(key);
        match removed {
            Some(refresher) => {
                refresher.shutdown();
                info!(key, "auto-refresh stopped");
                true
            }
            None => false,
        }
    }

    // == Preload ==
    /// Warms the cache for `key` without waiting for the result.
    ///
    /// Must be called from within a tokio runtime.
    pub fn preload<F, Fut>(&self, key: &str, config: Option<CacheConfig>, fetcher: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        let config = config.unwrap_or_else(|| self.inner.config.defaults.clone());
        // A pending lookup has already spawned its fetch; nothing to await
        if let Err(err) = self.lookup(key, &config, fetcher) {
            warn!(key, error = %err, "preload rejected");
        }
    }

    /// Preloads every item; fetches run concurrently.
    pub fn preload_bulk(&self, items: Vec<PreloadItem<V, E>>) {
        let count = items.len();
        for item in items {
            self.preload(&item.key, item.config, item.fetcher);
        }
        debug!(count, "bulk preload issued");
    }

    // == Invalidation ==
    /// Removes the entry and any in-flight fetch for `key`.
    ///
    /// Waiters of a removed fetch still receive its result, but the value is
    /// not stored. Returns whether anything was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut state = self.inner.lock();
        let had_entry = state.entries.remove(key).is_some();
        let had_flight = state.in_flight.remove(key).is_some();
        if had_entry || had_flight {
            debug!(key, "invalidated");
        }
        had_entry || had_flight
    }

    /// Removes every entry and in-flight fetch whose key matches `pattern`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut state = self.inner.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !pattern.is_match(key));
        state.in_flight.retain(|key, _| !pattern.is_match(key));
        let removed = before - state.entries.len();
        info!(pattern = pattern.as_str(), removed, "invalidated entries matching pattern");
        removed
    }

    /// Drops all entries, in-flight fetches and auto-refresh subscriptions.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        let entries = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        for (_, refresher) in state.refreshers.drain() {
            refresher.shutdown();
        }
        info!(entries, "cache cleared");
    }

    /// Removes entries that expired more than `stale_retention` ago, along
    /// with auto-refresh subscriptions that lost all their subscribers.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let grace = self.inner.config.stale_retention;
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        Inner::prune_refreshers(state);
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| !entry.is_expired_beyond(now, grace));
        before - state.entries.len()
    }

    // == Inspection ==
    /// True iff a fresh entry exists for `key`. Not counted as a hit.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_fresh(now))
    }

    /// Number of callers attached to the fetch in flight for `key`.
    pub fn in_flight_waiters(&self, key: &str) -> Option<usize> {
        self.inner
            .lock()
            .in_flight
            .get(key)
            .map(|flight| flight.waiters)
    }

    /// Counters plus a snapshot of the current contents.
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock();
        let mut stats = state.stats.clone();
        let mut keys: Vec<String> = state.entries.keys().cloned().collect();
        keys.sort();
        stats.size = keys.len();
        stats.keys = keys;
        stats.in_flight_count = state.in_flight.len();
        stats.memory_bytes = state.entries.values().map(|e| e.size_bytes).sum();
        stats.auto_refresh_count = state
            .refreshers
            .values()
            .filter(|refresher| refresher.sender.receiver_count() > 0)
            .count();
        stats
    }

    /// Per-entry snapshots sorted by key.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let now = Instant::now();
        let state = self.inner.lock();
        let mut infos: Vec<EntryInfo> = state
            .entries
            .iter()
            .map(|(key, entry)| entry.info(key, now))
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl<V, E> Inner<V, E>
where
    V: CacheValue,
    E: FetchError,
{
    fn lock(&self) -> MutexGuard<'_, State<V, E>> {
        // Critical sections never panic midway through an update
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the fetch and registers it as the in-flight request for `key`.
    ///
    /// `waiters` is 0 for background revalidation, which nobody awaits.
    ///
    /// Must run under the state lock so no second fetch can be registered
    /// between the caller's check and this insert.
    fn start_fetch<F, Fut>(
        inner: &Arc<Self>,
        state: &mut State<V, E>,
        key: &str,
        config: &CacheConfig,
        fetcher: F,
        waiters: usize,
    ) -> SharedFetch<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        state.next_flight += 1;
        let id = state.next_flight;

        let settle_with = Arc::clone(inner);
        let owned_key = key.to_string();
        let config = config.clone();
        let task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(async move { fetcher().await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => Err(E::from(CacheError::FetchPanicked(owned_key.clone()))),
            };
            settle_with.settle(&owned_key, id, &config, &result);
            result
        });

        let aborted_key = key.to_string();
        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(_) => Err(E::from(CacheError::FetchAborted(aborted_key))),
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.to_string(),
            InFlight {
                id,
                future: future.clone(),
                waiters,
            },
        );
        future
    }

    /// Records the outcome of fetch `id` for `key`.
    fn settle(
        &self,
        key: &str,
        id: u64,
        config: &CacheConfig,
        result: &std::result::Result<V, E>,
    ) {
        let mut guard = self.lock();
        let state = &mut *guard;

        let current = matches!(state.in_flight.get(key), Some(flight) if flight.id == id);
        let waiters = if current {
            state
                .in_flight
                .remove(key)
                .map(|flight| flight.waiters)
                .unwrap_or(0)
        } else {
            0
        };

        match result {
            Ok(value) if current => {
                self.store(state, key, value.clone(), config);
                debug!(key, waiters, "fetch settled, value stored");
            }
            Ok(_) => debug!(key, "discarding result of invalidated fetch"),
            Err(err) => {
                state.stats.record_fetch_failure();
                warn!(key, waiters, error = %err, "fetch failed");
            }
        }
    }

    /// Stores `value`, publishes it to subscribers and applies eviction.
    fn store(&self, state: &mut State<V, E>, key: &str, value: V, config: &CacheConfig) {
        let size_bytes = match (self.estimator)(&value) {
            Some(size) => size,
            None => {
                let fallback = self.config.fallback_entry_size;
                warn!(key, fallback, "size estimation failed, using fallback size");
                fallback
            }
        };

        if let Some(refresher) = state.refreshers.get(key) {
            refresher.sender.send_replace(Some(value.clone()));
        }

        state.next_seq += 1;
        let entry = CacheEntry::new(value, config.ttl, size_bytes, state.next_seq);
        state.entries.insert(key.to_string(), entry);

        let victims = LfuPolicy::new(config.max_entries, config.max_memory_bytes)
            .select_victims(&state.entries, Some(key));
        if !victims.is_empty() {
            for victim in &victims {
                state.entries.remove(victim);
            }
            state.stats.record_evictions(victims.len());
            debug!(key, evicted = victims.len(), "evicted least frequently used entries");
        }
    }

    fn store_refreshed(&self, key: &str, value: V, config: &CacheConfig) {
        let mut state = self.lock();
        self.store(&mut state, key, value, config);
    }

    /// Publishes the initial `get` result unless a store already did.
    fn publish_initial(&self, key: &str, value: V) {
        let state = self.lock();
        if let Some(refresher) = state.refreshers.get(key) {
            refresher.sender.send_if_modified(|current| {
                if current.is_none() {
                    *current = Some(value);
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Drops every subscription nobody listens to anymore, stopping its timer.
    fn prune_refreshers(state: &mut State<V, E>) -> usize {
        let unobserved: Vec<String> = state
            .refreshers
            .iter()
            .filter(|(_, refresher)| refresher.sender.receiver_count() == 0)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &unobserved {
            if let Some(refresher) = state.refreshers.remove(key) {
                refresher.shutdown();
            }
        }
        unobserved.len()
    }

    /// Drops the subscription for `key` if nobody listens anymore.
    ///
    /// Returns true when the timer for `key` should stop.
    fn retire_if_unobserved(&self, key: &str) -> bool {
        let mut state = self.lock();
        match state.refreshers.get(key) {
            Some(refresher) if refresher.sender.receiver_count() == 0 => {
                state.refreshers.remove(key);
                true
            }
            Some(_) => false,
            None => true,
        }
    }
}

fn spawn_refresh_timer<V, E, F, Fut>(
    inner: Weak<Inner<V, E>>,
    key: String,
    config: CacheConfig,
    period: Duration,
    fetcher: Arc<F>,
) -> JoinHandle<()>
where
    V: CacheValue,
    E: FetchError,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(key = %key, period_ms = period.as_millis() as u64, "auto-refresh timer started");

        loop {
            ticker.tick().await;

            let Some(inner) = inner.upgrade() else {
                break;
            };
            if inner.retire_if_unobserved(&key) {
                break;
            }

            match (*fetcher)().await {
                Ok(value) => {
                    inner.store_refreshed(&key, value, &config);
                    debug!(key = %key, "auto-refresh published new value");
                }
                Err(err) => warn!(key = %key, error = %err, "auto-refresh fetch failed"),
            }
        }

        info!(key = %key, "auto-refresh timer stopped");
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SharedError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Engine = CacheEngine<String, SharedError>;

    fn engine() -> Engine {
        CacheEngine::new(EngineConfig::default())
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: &str,
    ) -> impl FnOnce() -> BoxFuture<'static, std::result::Result<String, SharedError>> {
        let calls = Arc::clone(calls);
        let value = value.to_string();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(value) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let engine = engine();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = engine.get("k", counting(&calls, "v1")).await.unwrap();
        let second = engine.get("k", counting(&calls, "v2")).await.unwrap();

        assert_eq!(first, "v1");
        assert_eq!(second, "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = engine.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(engine.entries()[0].hit_count, 2);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let engine = engine();
        let calls = Arc::new(AtomicUsize::new(0));

        let err = engine.get("", counting(&calls, "v")).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<CacheError>(),
            Some(&CacheError::EmptyKey)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_has_does_not_count_as_hit() {
        let engine = engine();
        let calls = Arc::new(AtomicUsize::new(0));

        assert!(!engine.has("k"));
        engine.get("k", counting(&calls, "v")).await.unwrap();
        assert!(engine.has("k"));
        assert!(engine.has("k"));

        assert_eq!(engine.stats().hits, 0);
        assert_eq!(engine.entries()[0].hit_count, 1);
    }

    #[tokio::test]
    async fn test_panicking_fetcher_reports_error() {
        let engine = engine();

        let err = engine
            .get("k", || async {
                if true {
                    panic!("boom");
                }
                Ok::<String, SharedError>("unreachable".to_string())
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<CacheError>(),
            Some(&CacheError::FetchPanicked("k".to_string()))
        );
        assert!(engine.is_empty());
        assert_eq!(engine.stats().in_flight_count, 0);
        assert_eq!(engine.stats().fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_size_estimation_fallback() {
        let config = EngineConfig {
            fallback_entry_size: 77,
            ..EngineConfig::default()
        };
        let estimator: SizeEstimator<String> = Arc::new(|_: &String| -> Option<usize> { None });
        let engine: Engine = CacheEngine::with_size_estimator(config, estimator);
        let calls = Arc::new(AtomicUsize::new(0));

        engine.get("k", counting(&calls, "v")).await.unwrap();

        assert_eq!(engine.len(), 1);
        assert_eq!(engine.stats().memory_bytes, 77);
    }

    #[tokio::test]
    async fn test_memory_bound_keeps_oversized_new_entry() {
        let engine = engine();
        let config = CacheConfig::default().with_max_memory_bytes(4);
        let calls = Arc::new(AtomicUsize::new(0));

        engine
            .get_with_config("a", &config, counting(&calls, "aa"))
            .await
            .unwrap();
        engine
            .get_with_config("b", &config, counting(&calls, "a much longer value"))
            .await
            .unwrap();

        // "a" is evicted, "b" alone exceeds the budget and is kept
        assert_eq!(engine.stats().keys, vec!["b".to_string()]);
        assert_eq!(engine.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_respects_retention() {
        let config = EngineConfig {
            stale_retention: Duration::from_millis(500),
            ..EngineConfig::default()
        };
        let engine: Engine = CacheEngine::new(config);
        let ttl = CacheConfig::default().with_ttl(Duration::from_millis(1000));
        let calls = Arc::new(AtomicUsize::new(0));

        engine
            .get_with_config("k", &ttl, counting(&calls, "v"))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(1200)).await;
        assert_eq!(engine.purge_expired(), 0);

        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(engine.purge_expired(), 1);
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_stop_auto_refresh_closes_stream() {
        let engine = engine();
        let mut stream = engine
            .get_with_auto_refresh("k", &CacheConfig::default(), || async {
                Ok::<_, SharedError>("v".to_string())
            })
            .unwrap();

        assert_eq!(stream.next().await, Some("v".to_string()));
        assert!(engine.stop_auto_refresh("k"));
        assert_eq!(stream.next().await, None);
        assert!(!engine.stop_auto_refresh("k"));
    }

    #[tokio::test]
    async fn test_unobserved_subscriptions_are_pruned() {
        let engine = engine();
        for key in ["a", "b", "c"] {
            let mut stream = engine
                .get_with_auto_refresh(key, &CacheConfig::default(), || async {
                    Ok::<_, SharedError>("v".to_string())
                })
                .unwrap();
            assert_eq!(stream.next().await, Some("v".to_string()));
        }

        // Each new subscription prunes the ones dropped before it
        assert_eq!(engine.inner.lock().refreshers.len(), 1);
        assert_eq!(engine.stats().auto_refresh_count, 0);

        engine.purge_expired();
        assert!(engine.inner.lock().refreshers.is_empty());
    }
}
