//! Configuration loading and validation

pub mod backdesk_config;
pub mod validation;

pub use backdesk_config::{ApiConfig, BackdeskConfig, CacheConfig};
