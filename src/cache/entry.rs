//! Cache entries and consumer-visible snapshots

use crate::error::BackdeskError;
use crate::retry::RetryConfig;
use crate::tag::Tag;
use crate::transport::Payload;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Entry exists but no fetch has started yet
    Uninitialized,
    /// A fetch is in flight; `data` may still hold the previous result
    Pending,
    /// Last completed fetch succeeded
    Fulfilled,
    /// Last completed fetch failed; `data` keeps the last good result
    Rejected,
}

/// Cloneable snapshot broadcast to subscribers through a watch channel
#[derive(Debug, Clone)]
pub struct QueryState {
    pub status: QueryStatus,
    /// Latest successful payload, retained across refetches and failures
    pub data: Option<Arc<Payload>>,
    /// Error from the last completed fetch, cleared on the next success
    pub error: Option<Arc<BackdeskError>>,
}

impl QueryState {
    pub(crate) fn uninitialized() -> Self {
        Self {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status == QueryStatus::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.status == QueryStatus::Rejected
    }

    /// True once a fetch has completed, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, QueryStatus::Fulfilled | QueryStatus::Rejected)
    }
}

/// One cached query result plus its bookkeeping.
///
/// Entries live behind the cache mutex; the watch sender publishes
/// snapshots to subscribers outside the lock's reach.
pub(crate) struct CacheEntry {
    /// Original argument, kept to rebuild requests and derive tags
    pub arg: Value,
    /// Snapshot broadcaster; receivers are held by subscriptions
    pub tx: watch::Sender<QueryState>,
    /// Live subscription count
    pub subscribers: usize,
    /// Set by invalidation; a stale entry refetches on its next subscribe
    pub stale: bool,
    /// Sequence number of the newest spawned fetch; older resolutions
    /// are discarded on arrival
    pub fetch_seq: u64,
    /// A fetch task is active for `fetch_seq`
    pub fetching: bool,
    /// Last fetch resolved with zero subscribers and was discarded
    pub fetch_abandoned: bool,
    /// Tags from this entry's own last successful result
    pub provided_tags: HashSet<Tag>,
    /// Bumped each time the subscriber count reaches zero; keep-alive
    /// timers only evict when their epoch is still current
    pub idle_epoch: u64,
    /// Per-subscription retry policy (last subscriber's choice wins)
    pub retry: Option<RetryConfig>,
}

impl CacheEntry {
    pub fn new(arg: Value) -> Self {
        let (tx, _) = watch::channel(QueryState::uninitialized());
        Self {
            arg,
            tx,
            subscribers: 0,
            stale: false,
            fetch_seq: 0,
            fetching: false,
            fetch_abandoned: false,
            provided_tags: HashSet::new(),
            idle_epoch: 0,
            retry: None,
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> QueryState {
        self.tx.borrow().clone()
    }

    /// Publish a modified copy of the current snapshot.
    pub fn publish(&self, update: impl FnOnce(&mut QueryState)) {
        let mut state = self.snapshot();
        update(&mut state);
        // send_replace delivers even when no receiver is currently held
        self.tx.send_replace(state);
    }

    /// Whether any of this entry's provided tags appear in `tags`.
    pub fn matches_tags(&self, tags: &[Tag]) -> bool {
        tags.iter().any(|tag| self.provided_tags.contains(tag))
    }
}

/// Point-in-time counters for debugging surfaces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub active_subscriptions: usize,
    pub stale_entries: usize,
    pub in_flight_fetches: usize,
}
