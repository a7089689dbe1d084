//! Tagged query cache
//!
//! Results are keyed by `(endpoint, argument)` and carry the tags their
//! endpoint derives from each successful result. Mutations declare the
//! tags they invalidate; invalidation refetches subscribed entries and
//! lazily marks the rest stale. See `QueryCache` for the operations.

pub mod entry;
pub mod key;
pub mod query_cache;

pub use entry::{CacheStats, QueryState, QueryStatus};
pub use key::QueryKey;
pub use query_cache::{
    CacheOptions, MutateOptions, QueryCache, SubscribeOptions, Subscription,
};
