//! The tagged query cache
//!
//! One `QueryCache` owns the entry table, the endpoint registry, and a
//! transport backend. Entries are created on first subscription, shared
//! by key, refreshed through tag invalidation, and evicted once they have
//! been subscriber-free for the keep-alive window.
//!
//! The entry table sits behind a plain mutex with short critical
//! sections; the lock is never held across an await. Fetches run as
//! spawned tasks and re-enter through `apply_fetch_result`, where a
//! per-entry sequence number drops superseded or abandoned responses.

use crate::cache::entry::{CacheEntry, CacheStats, QueryState, QueryStatus};
use crate::cache::key::QueryKey;
use crate::endpoint::{EndpointRegistry, EndpointRequest};
use crate::error::{BackdeskError, Result};
use crate::retry::{with_retry, RetryConfig};
use crate::tag::Tag;
use crate::transport::{Backend, Payload};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Cache-wide tuning
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// How long a subscriber-free entry survives before eviction
    pub keep_alive: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(60),
        }
    }
}

/// Per-subscription settings
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Bounded retry for this entry's fetches. `None` leaves the entry's
    /// current policy untouched; the last subscriber to specify one wins.
    pub retry: Option<RetryConfig>,
}

impl SubscribeOptions {
    pub fn with_retry(config: RetryConfig) -> Self {
        Self {
            retry: Some(config),
        }
    }
}

/// Per-mutation settings
#[derive(Debug, Clone, Default)]
pub struct MutateOptions {
    /// Bounded retry for the mutation request
    pub retry: Option<RetryConfig>,
}

impl MutateOptions {
    pub fn with_retry(config: RetryConfig) -> Self {
        Self {
            retry: Some(config),
        }
    }
}

/// Everything a spawned fetch needs to resolve back into the table
struct FetchTicket {
    key: QueryKey,
    request: EndpointRequest,
    seq: u64,
    retry: Option<RetryConfig>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    disposed: bool,
}

struct CacheInner {
    registry: EndpointRegistry,
    backend: Arc<dyn Backend>,
    keep_alive: Duration,
    state: Mutex<CacheState>,
}

/// Tagged query cache over a registered endpoint catalog.
///
/// Cheap to clone; clones share one entry table. `dispose` tears the
/// table down and fails later operations with `Disposed`.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new(registry: EndpointRegistry, backend: Arc<dyn Backend>) -> Self {
        Self::with_options(registry, backend, CacheOptions::default())
    }

    pub fn with_options(
        registry: EndpointRegistry,
        backend: Arc<dyn Backend>,
        options: CacheOptions,
    ) -> Self {
        debug!(
            queries = registry.query_count(),
            mutations = registry.mutation_count(),
            keep_alive_ms = options.keep_alive.as_millis() as u64,
            "query cache created"
        );
        Self {
            inner: Arc::new(CacheInner {
                registry,
                backend,
                keep_alive: options.keep_alive,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Subscribe to a query endpoint with the given argument.
    ///
    /// An existing live entry is shared: the subscriber count goes up and
    /// any in-flight fetch is observed through the entry's channel, never
    /// duplicated. A fresh fetch starts only for a new entry or a stale
    /// one. A rejected entry is served as-is, stored error included,
    /// until a mutation invalidates its tags or a refetch is requested.
    pub fn subscribe(&self, endpoint: &str, arg: Value) -> Result<Subscription> {
        self.subscribe_with_options(endpoint, arg, SubscribeOptions::default())
    }

    pub fn subscribe_with_options(
        &self,
        endpoint: &str,
        arg: Value,
        options: SubscribeOptions,
    ) -> Result<Subscription> {
        let descriptor = self.inner.registry.query(endpoint)?;
        let key = QueryKey::new(endpoint, &arg);

        let mut ticket = None;
        let rx;
        {
            let mut state = self.inner.lock_state();
            if state.disposed {
                return Err(BackdeskError::Disposed);
            }

            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(arg));
            entry.subscribers += 1;
            if options.retry.is_some() {
                entry.retry = options.retry;
            }
            rx = entry.tx.subscribe();

            let status = entry.snapshot().status;
            let needs_fetch =
                !entry.fetching && (entry.stale || status == QueryStatus::Uninitialized);
            if needs_fetch {
                if entry.fetch_abandoned {
                    debug!(key = %key, "restarting fetch abandoned at zero subscribers");
                }
                let request = descriptor.request(&entry.arg);
                ticket = Some(self.inner.start_fetch_locked(&key, entry, request));
            }
        }

        if let Some(ticket) = ticket {
            self.inner.spawn_fetch(ticket);
        }

        Ok(Subscription {
            inner: Arc::clone(&self.inner),
            key,
            rx,
        })
    }

    /// Execute a mutation; on success, invalidate the tags it declares.
    pub async fn mutate(&self, endpoint: &str, arg: Value) -> Result<Payload> {
        self.mutate_with_options(endpoint, arg, MutateOptions::default())
            .await
    }

    pub async fn mutate_with_options(
        &self,
        endpoint: &str,
        arg: Value,
        options: MutateOptions,
    ) -> Result<Payload> {
        if self.is_disposed() {
            return Err(BackdeskError::Disposed);
        }

        let descriptor = self.inner.registry.mutation(endpoint)?;
        let request = descriptor.request(&arg);
        debug!(endpoint, "executing mutation");

        let payload = match &options.retry {
            Some(config) => {
                with_retry(config, endpoint, || self.inner.backend.execute(&request)).await?
            }
            None => self.inner.backend.execute(&request).await?,
        };

        let result_json = payload.as_json().cloned().unwrap_or(Value::Null);
        let tags = descriptor.invalidated_tags(&arg, &result_json);
        debug!(endpoint, tags = tags.len(), "mutation succeeded");
        self.invalidate(&tags);
        Ok(payload)
    }

    /// Invalidate every entry whose provided tags intersect `tags`.
    ///
    /// Entries with subscribers refetch immediately, keeping their data
    /// visible while Pending. Subscriber-free entries are only marked
    /// stale; their refetch waits for the next subscription.
    pub fn invalidate(&self, tags: &[Tag]) {
        if tags.is_empty() {
            return;
        }

        let mut tickets = Vec::new();
        {
            let mut state = self.inner.lock_state();
            if state.disposed {
                return;
            }

            for (key, entry) in state.entries.iter_mut() {
                if !entry.matches_tags(tags) {
                    continue;
                }
                if entry.subscribers > 0 {
                    // restart even if a fetch is in flight; the old
                    // response would predate the invalidation
                    let Ok(descriptor) = self.inner.registry.query(key.endpoint()) else {
                        continue;
                    };
                    let request = descriptor.request(&entry.arg);
                    tickets.push(self.inner.start_fetch_locked(key, entry, request));
                } else {
                    entry.stale = true;
                    debug!(key = %key, "marked stale, refetch deferred");
                }
            }
        }

        for ticket in tickets {
            self.inner.spawn_fetch(ticket);
        }
    }

    /// Force a fresh fetch for an existing entry. Returns `Ok(false)`
    /// when no entry lives under the key.
    pub fn refetch(&self, key: &QueryKey) -> Result<bool> {
        self.inner.refetch_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock_state();
        let mut stats = CacheStats {
            entries: state.entries.len(),
            ..CacheStats::default()
        };
        for entry in state.entries.values() {
            stats.active_subscriptions += entry.subscribers;
            if entry.stale {
                stats.stale_entries += 1;
            }
            if entry.fetching {
                stats.in_flight_fetches += 1;
            }
        }
        stats
    }

    /// Drop every entry and refuse further operations.
    ///
    /// Idempotent. Open subscriptions observe the channel closing; fetches
    /// still in flight resolve into nothing.
    pub fn dispose(&self) {
        let mut state = self.inner.lock_state();
        if state.disposed {
            return;
        }
        state.disposed = true;
        let entries = state.entries.len();
        state.entries.clear();
        debug!(entries, "cache disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock_state().disposed
    }

    /// Registered endpoint names, for startup logging.
    pub fn endpoint_names(&self) -> Vec<&'static str> {
        self.inner.registry.names()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CacheInner {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump the fetch sequence and publish Pending. Caller holds the lock
    /// and spawns the returned ticket after releasing it.
    fn start_fetch_locked(
        &self,
        key: &QueryKey,
        entry: &mut CacheEntry,
        request: EndpointRequest,
    ) -> FetchTicket {
        entry.fetch_seq += 1;
        entry.fetching = true;
        entry.fetch_abandoned = false;
        entry.stale = false;
        entry.publish(|state| state.status = QueryStatus::Pending);
        debug!(key = %key, seq = entry.fetch_seq, "fetch started");

        FetchTicket {
            key: key.clone(),
            request,
            seq: entry.fetch_seq,
            retry: entry.retry.clone(),
        }
    }

    fn spawn_fetch(self: &Arc<Self>, ticket: FetchTicket) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = match &ticket.retry {
                Some(config) => {
                    with_retry(config, ticket.request.endpoint, || {
                        inner.backend.execute(&ticket.request)
                    })
                    .await
                }
                None => inner.backend.execute(&ticket.request).await,
            };
            inner.apply_fetch_result(&ticket.key, ticket.seq, result);
        });
    }

    /// Apply one fetch's outcome atomically, or discard it.
    ///
    /// Discarded: entry evicted, sequence superseded, cache disposed, or
    /// nobody left subscribed. A success recomputes the entry's provided
    /// tags from its own result; a failure keeps previous data and tags.
    fn apply_fetch_result(&self, key: &QueryKey, seq: u64, result: Result<Payload>) {
        let mut state = self.lock_state();
        if state.disposed {
            return;
        }
        let Some(entry) = state.entries.get_mut(key) else {
            debug!(key = %key, "fetch resolved after eviction, discarded");
            return;
        };
        if entry.fetch_seq != seq {
            debug!(key = %key, seq, current = entry.fetch_seq, "fetch superseded, discarded");
            return;
        }

        entry.fetching = false;

        if entry.subscribers == 0 {
            entry.stale = true;
            entry.fetch_abandoned = true;
            debug!(key = %key, "fetch resolved with no subscribers, discarded");
            return;
        }

        match result {
            Ok(payload) => {
                entry.provided_tags = self.provided_tags_for(key, entry, &payload);
                let payload = Arc::new(payload);
                entry.publish(|state| {
                    state.status = QueryStatus::Fulfilled;
                    state.data = Some(Arc::clone(&payload));
                    state.error = None;
                });
                debug!(key = %key, tags = entry.provided_tags.len(), "fetch fulfilled");
            }
            Err(error) => {
                // previous data and tags stay; consumers choose whether to
                // keep showing them next to the error
                let error = Arc::new(error);
                entry.publish(|state| {
                    state.status = QueryStatus::Rejected;
                    state.error = Some(Arc::clone(&error));
                });
                warn!(key = %key, error = %error, "fetch rejected");
            }
        }
    }

    fn provided_tags_for(
        &self,
        key: &QueryKey,
        entry: &CacheEntry,
        payload: &Payload,
    ) -> HashSet<Tag> {
        let Ok(descriptor) = self.registry.query(key.endpoint()) else {
            return HashSet::new();
        };
        match payload.as_json() {
            Some(json) => descriptor
                .provided_tags(json, &entry.arg)
                .into_iter()
                .collect(),
            None => HashSet::new(),
        }
    }

    fn refetch_key(self: &Arc<Self>, key: &QueryKey) -> Result<bool> {
        let ticket;
        {
            let mut state = self.lock_state();
            if state.disposed {
                return Err(BackdeskError::Disposed);
            }
            let Some(entry) = state.entries.get_mut(key) else {
                return Ok(false);
            };
            let Ok(descriptor) = self.registry.query(key.endpoint()) else {
                return Ok(false);
            };
            let request = descriptor.request(&entry.arg);
            ticket = self.start_fetch_locked(key, entry, request);
        }
        self.spawn_fetch(ticket);
        Ok(true)
    }

    /// Subscription dropped: decrement, and at zero arm the keep-alive
    /// timer (or evict straight away when the window is zero or no
    /// runtime is available to time it).
    fn release(self: &Arc<Self>, key: &QueryKey) {
        let mut arm_timer = None;
        {
            let mut state = self.lock_state();
            if state.disposed {
                return;
            }
            let Some(entry) = state.entries.get_mut(key) else {
                return;
            };
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers > 0 {
                return;
            }
            entry.idle_epoch += 1;

            if self.keep_alive.is_zero() {
                state.entries.remove(key);
                debug!(key = %key, "entry evicted");
                return;
            }
            arm_timer = Some(entry.idle_epoch);
        }

        if let Some(epoch) = arm_timer {
            let keep_alive = self.keep_alive;
            match Handle::try_current() {
                Ok(handle) => {
                    let inner = Arc::clone(self);
                    let key = key.clone();
                    handle.spawn(async move {
                        tokio::time::sleep(keep_alive).await;
                        inner.evict_if_idle(&key, epoch);
                    });
                }
                // dropped outside the runtime; evict now rather than leak
                Err(_) => self.evict_if_idle(key, epoch),
            }
        }
    }

    fn evict_if_idle(&self, key: &QueryKey, epoch: u64) {
        let mut state = self.lock_state();
        if state.disposed {
            return;
        }
        let idle = state
            .entries
            .get(key)
            .map(|entry| entry.subscribers == 0 && entry.idle_epoch == epoch)
            .unwrap_or(false);
        if idle {
            state.entries.remove(key);
            debug!(key = %key, "entry evicted after keep-alive");
        }
    }
}

/// Live handle onto one cache entry.
///
/// Dropping the handle is the unsubscribe: the entry's subscriber count
/// decrements, and once it reaches zero the keep-alive clock starts.
pub struct Subscription {
    inner: Arc<CacheInner>,
    key: QueryKey,
    rx: watch::Receiver<QueryState>,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Latest snapshot, without waiting.
    pub fn state(&self) -> QueryState {
        self.rx.borrow().clone()
    }

    /// Wait for the next published snapshot. Returns `None` once the
    /// entry has been evicted or the cache disposed.
    pub async fn next_state(&mut self) -> Option<QueryState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the current fetch cycle settles (Fulfilled or Rejected).
    pub async fn ready(&mut self) -> QueryState {
        loop {
            let state = self.rx.borrow_and_update().clone();
            if state.is_settled() {
                return state;
            }
            if self.rx.changed().await.is_err() {
                // cache went away mid-fetch; the last snapshot is all there is
                return self.rx.borrow().clone();
            }
        }
    }

    /// Force a fresh fetch for this entry.
    pub fn refetch(&self) -> Result<bool> {
        self.inner.refetch_key(&self.key)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.release(&self.key);
    }
}
