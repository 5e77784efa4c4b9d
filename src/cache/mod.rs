//! Keyed query cache with stale-while-revalidate reads.
//!
//! Every key owns one [`Entry`]: last value, last error, staleness flag and
//! the generation of the fetch it is currently willing to accept.
//!
//! ## Read path
//!
//! [`QueryCache::read`] answers synchronously from the entry and, when the
//! entry is stale or empty and no fetch is outstanding, spawns one. Readers
//! arriving while a fetch is outstanding attach to it instead of sending a
//! second request.
//!
//! ## Ordering
//!
//! Each spawned fetch is stamped with a generation drawn from one cache-wide
//! counter, so stamps are never reused, not even after an entry is evicted
//! and recreated. A response is applied only if its generation is still the
//! one the entry waits for, so a slow response overtaken by a newer fetch, or
//! one whose view went away, is dropped on arrival and can never roll the
//! entry back.
//!
//! ## Observers
//!
//! Views [`retain`](QueryCache::retain) the key they show and
//! [`release`](QueryCache::release) it when they move on. The in-flight fetch
//! of a key is abandoned only once its last observer lets go, so one view
//! leaving never cancels a fetch another view is still waiting on.
//!
//! ## Invalidation
//!
//! [`QueryCache::invalidate`] flags every key under a prefix as stale. A fetch
//! already in flight when that happens still lands (it is the newest data
//! available) but leaves the entry stale, since the server may have changed
//! after the request was sent.

mod key;

pub use key::{KeyPrefix, QueryData, QueryKey, Segment};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::client::{ApiError, ResourceApi};
use crate::config::CacheConfig;
use crate::observability::Metrics;

#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error(transparent)]
    Request(#[from] ApiError),
    #[error("fetch for '{0}' was abandoned")]
    Cancelled(String),
}

/// What the last settled fetch of a key ended with
#[derive(Debug, Clone)]
enum Settlement {
    Fetched,
    Failed(ApiError),
    Cancelled,
}

struct Entry {
    data: Option<Arc<QueryData>>,
    error: Option<ApiError>,
    stale: bool,
    fetched_at: Option<Instant>,
    /// Newest generation handed out for this key
    issued: u64,
    /// Views currently showing this key
    observers: usize,
    /// `issued` at the time of the last invalidation
    invalidated_at: u64,
    /// Generation whose response will be accepted
    in_flight: Option<u64>,
    abort: Option<AbortHandle>,
    settlement: Option<Settlement>,
    changes: watch::Sender<u64>,
}

impl Entry {
    fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            data: None,
            error: None,
            stale: false,
            fetched_at: None,
            issued: 0,
            observers: 0,
            invalidated_at: 0,
            in_flight: None,
            abort: None,
            settlement: None,
            changes,
        }
    }

    fn is_stale(&self, stale_time: Duration) -> bool {
        match (&self.data, self.fetched_at) {
            (Some(_), Some(fetched_at)) => self.stale || fetched_at.elapsed() >= stale_time,
            _ => true,
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    fn snapshot(&self, stale_time: Duration) -> QuerySnapshot {
        QuerySnapshot {
            data: self.data.clone(),
            error: self.error.clone(),
            stale: self.is_stale(stale_time),
            fetching: self.in_flight.is_some(),
            fetched_at: self.fetched_at,
        }
    }
}

/// Point-in-time view of one cache entry
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    /// Last successfully fetched value, kept through later failures
    pub data: Option<Arc<QueryData>>,
    /// Error of the last failed fetch, until dismissed or a fetch succeeds
    pub error: Option<ApiError>,
    pub stale: bool,
    pub fetching: bool,
    pub fetched_at: Option<Instant>,
}

impl QuerySnapshot {
    fn empty() -> Self {
        Self {
            data: None,
            error: None,
            stale: true,
            fetching: false,
            fetched_at: None,
        }
    }

    /// Nothing to show yet and a fetch is on its way
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }
}

struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    /// Last generation handed out to any key
    generation: u64,
}


/// Shared query cache; clones share the same entries
#[derive(Clone)]
pub struct QueryCache {
    api: Arc<dyn ResourceApi>,
    state: Arc<Mutex<CacheState>>,
    metrics: Arc<Metrics>,
    stale_time: Duration,
}

impl QueryCache {
    pub fn new(api: Arc<dyn ResourceApi>, stale_time: Duration) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                generation: 0,
            })),
            metrics: Arc::new(Metrics::new()),
            stale_time,
        }
    }

    pub fn from_config(api: Arc<dyn ResourceApi>, config: &CacheConfig) -> Self {
        Self::new(api, config.stale_time.as_duration())
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn api(&self) -> &Arc<dyn ResourceApi> {
        &self.api
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return what is cached now; start a background fetch if stale or absent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn read(&self, key: &QueryKey) -> QuerySnapshot {
        let mut state = self.lock();
        let state = &mut *state;
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(Entry::new);

        if entry.is_stale(self.stale_time) {
            if entry.in_flight.is_some() {
                self.metrics.read_coalesced();
                debug!(%key, "Read attached to in-flight fetch");
            } else {
                state.generation += 1;
                self.start_fetch(key, entry, state.generation);
            }
        }

        entry.snapshot(self.stale_time)
    }

    /// Current entry state without triggering any fetch
    pub fn peek(&self, key: &QueryKey) -> Option<QuerySnapshot> {
        self.lock()
            .entries
            .get(key)
            .map(|entry| entry.snapshot(self.stale_time))
    }

    /// Resolve to fresh data: cached value if still fresh, otherwise the
    /// result of the (possibly shared) fetch in flight.
    pub async fn fetch(&self, key: &QueryKey) -> Result<Arc<QueryData>, QueryError> {
        let mut changes = {
            let mut state = self.lock();
            let state = &mut *state;
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(Entry::new);

            if !entry.is_stale(self.stale_time) {
                if let Some(data) = &entry.data {
                    return Ok(data.clone());
                }
            }

            if entry.in_flight.is_some() {
                self.metrics.read_coalesced();
            } else {
                state.generation += 1;
                self.start_fetch(key, entry, state.generation);
            }

            entry.changes.subscribe()
        };

        self.settled(key, &mut changes).await
    }

    /// Start a new fetch regardless of state, superseding any outstanding one
    pub fn refetch(&self, key: &QueryKey) -> QuerySnapshot {
        let mut state = self.lock();
        state.generation += 1;
        let generation = state.generation;
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(Entry::new);

        self.start_fetch(key, entry, generation);
        entry.snapshot(self.stale_time)
    }

    async fn settled(
        &self,
        key: &QueryKey,
        changes: &mut watch::Receiver<u64>,
    ) -> Result<Arc<QueryData>, QueryError> {
        loop {
            if changes.changed().await.is_err() {
                return Err(QueryError::Cancelled(key.to_string()));
            }

            let state = self.lock();
            let Some(entry) = state.entries.get(key) else {
                return Err(QueryError::Cancelled(key.to_string()));
            };

            // A newer fetch took over; keep waiting for that one
            if entry.in_flight.is_some() {
                continue;
            }

            match &entry.settlement {
                Some(Settlement::Fetched) => {
                    if let Some(data) = &entry.data {
                        return Ok(data.clone());
                    }
                }
                Some(Settlement::Failed(err)) => return Err(QueryError::Request(err.clone())),
                Some(Settlement::Cancelled) => {
                    return Err(QueryError::Cancelled(key.to_string()));
                }
                None => {}
            }
        }
    }

    fn start_fetch(&self, key: &QueryKey, entry: &mut Entry, generation: u64) {
        entry.issued = generation;

        if let Some(previous) = entry.in_flight.replace(generation) {
            debug!(%key, previous, generation, "Superseding in-flight fetch");
        } else {
            debug!(%key, generation, "Fetch started");
        }
        self.metrics.fetch_started();

        let cache = self.clone();
        let key = key.clone();
        let handle = tokio::spawn(async move {
            let result = key.fetch(cache.api.as_ref()).await;
            cache.complete(&key, generation, result);
        });

        entry.abort = Some(handle.abort_handle());
        entry.notify();
    }

    fn complete(&self, key: &QueryKey, generation: u64, result: Result<QueryData, ApiError>) {
        let mut state = self.lock();

        let Some(entry) = state.entries.get_mut(key) else {
            self.metrics.response_discarded();
            debug!(%key, generation, "Response for evicted key discarded");
            return;
        };

        if entry.in_flight != Some(generation) {
            self.metrics.response_discarded();
            debug!(%key, generation, current = ?entry.in_flight, "Superseded response discarded");
            return;
        }

        entry.in_flight = None;
        entry.abort = None;

        match result {
            Ok(data) => {
                debug!(%key, generation, rows = data.row_count(), "Fetch applied");
                entry.data = Some(Arc::new(data));
                entry.error = None;
                entry.fetched_at = Some(Instant::now());
                entry.stale = generation <= entry.invalidated_at;
                entry.settlement = Some(Settlement::Fetched);
            }
            Err(err) => {
                self.metrics.fetch_failed();
                warn!(%key, generation, code = err.code(), error = %err, "Fetch failed");
                entry.error = Some(err.clone());
                entry.settlement = Some(Settlement::Failed(err));
            }
        }

        entry.notify();
    }

    /// Mark every entry under `prefix` stale; returns how many were touched
    pub fn invalidate(&self, prefix: &KeyPrefix) -> usize {
        let mut state = self.lock();
        let mut touched = 0;

        for (key, entry) in state.entries.iter_mut() {
            if prefix.matches(key) {
                entry.stale = true;
                entry.invalidated_at = entry.issued;
                entry.notify();
                touched += 1;
            }
        }

        self.metrics.invalidated(touched as u64);
        debug!(%prefix, touched, "Invalidated");
        touched
    }

    /// Abandon the in-flight fetch of `key`; its response will be ignored
    pub fn cancel(&self, key: &QueryKey) -> bool {
        let mut state = self.lock();
        state
            .entries
            .get_mut(key)
            .is_some_and(|entry| Self::abandon(key, entry))
    }

    fn abandon(key: &QueryKey, entry: &mut Entry) -> bool {
        let Some(generation) = entry.in_flight.take() else {
            return false;
        };

        if let Some(abort) = entry.abort.take() {
            abort.abort();
        }
        entry.settlement = Some(Settlement::Cancelled);
        entry.notify();
        debug!(%key, generation, "Fetch cancelled");
        true
    }

    /// Register one more observer of `key`
    pub fn retain(&self, key: &QueryKey) {
        let mut state = self.lock();
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(Entry::new);
        entry.observers += 1;
    }

    /// Drop one observer of `key`. When the last one goes, the in-flight
    /// fetch is abandoned; returns whether that happened.
    pub fn release(&self, key: &QueryKey) -> bool {
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(key) else {
            return false;
        };

        if entry.observers == 0 {
            return false;
        }
        entry.observers -= 1;
        if entry.observers > 0 {
            debug!(%key, observers = entry.observers, "Observer released, fetch kept");
            return false;
        }
        Self::abandon(key, entry)
    }

    /// Number of views currently showing `key`
    pub fn observers(&self, key: &QueryKey) -> usize {
        self.lock()
            .entries
            .get(key)
            .map(|entry| entry.observers)
            .unwrap_or(0)
    }

    /// Drop the entry entirely, abandoning any fetch in flight
    pub fn evict(&self, key: &QueryKey) -> bool {
        let removed = self.lock().entries.remove(key);
        match removed {
            Some(entry) => {
                if let Some(abort) = entry.abort {
                    abort.abort();
                }
                debug!(%key, "Entry evicted");
                true
            }
            None => false,
        }
    }

    /// Clear the error banner of `key`, keeping its data
    pub fn dismiss_error(&self, key: &QueryKey) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(key) {
            if entry.error.take().is_some() {
                entry.notify();
            }
        }
    }

    /// Receiver that ticks whenever the entry for `key` changes
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<u64> {
        self.lock()
            .entries
            .entry(key.clone())
            .or_insert_with(Entry::new)
            .changes
            .subscribe()
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.peek(key).map(|snapshot| snapshot.stale).unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QuerySnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
