//! Logging configuration using tracing
//!
//! The data layer logs cache lifecycle events (entry creation, fetches,
//! invalidations, evictions) with structured fields. Host applications that
//! bring their own subscriber can skip this module entirely.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber for standalone use.
///
/// Filtering respects `RUST_LOG` and defaults to `warn` so embedding
/// applications stay quiet unless asked. Typical values:
/// - `RUST_LOG=backdesk=debug` - cache decisions (dedup hits, invalidation fan-out)
/// - `RUST_LOG=backdesk=trace` - every snapshot broadcast
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init() -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).compact())
        .try_init()
        .map_err(|e| {
            crate::BackdeskError::Config(format!("Failed to initialize tracing: {}", e))
        })?;

    Ok(())
}

/// Initialize logging for tests (no-op if a subscriber is already installed)
pub fn init_test() {
    let _ = init();
}
