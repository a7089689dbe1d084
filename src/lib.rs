//! Backdesk - Client-side data layer for a small-business back office
//!
//! Sales-performance reports and bank payment/receipt records, served
//! through a tagged query cache. Queries subscribe to cached results
//! keyed by `(endpoint, argument)`; mutations declare the tags they
//! invalidate, and invalidation refetches whatever subscribed entries
//! provided those tags. The endpoint catalog is registered once at
//! startup; the cache core carries no domain knowledge of its own.
//!
//! # Architecture
//!
//! - **tag**: Tag vocabulary primitives (Tag, kinds, the LIST marker)
//! - **endpoint**: Endpoint descriptors and the startup registry
//! - **cache**: The tagged query cache (entries, subscriptions, invalidation)
//! - **transport**: The `Backend` trait and the reqwest HTTP backend
//! - **api**: The concrete catalog (reports, bank payments, bank receipts)
//! - **client**: `BackdeskClient`, typed wrappers over the cache
//! - **retry**: Opt-in bounded retry with exponential backoff
//! - **config**: YAML configuration with validation
//! - **error** / **logging**: Crate-wide error enum and tracing setup

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod retry;
pub mod tag;
pub mod transport;

pub use cache::{
    CacheOptions, CacheStats, MutateOptions, QueryCache, QueryKey, QueryState, QueryStatus,
    SubscribeOptions, Subscription,
};
pub use client::{BackdeskClient, Query};
pub use config::BackdeskConfig;
pub use error::{BackdeskError, Result};
pub use tag::{Tag, TagId, TagKind};
pub use transport::{Backend, HttpBackend, Payload};
