//! Configuration validation

use crate::config::BackdeskConfig;
use crate::error::{BackdeskError, Result};

/// Upper bound on configured timeouts; anything longer is a typo
const MAX_TIMEOUT_SECS: u64 = 600;

pub fn validate(config: &BackdeskConfig) -> Result<()> {
    validate_base_url(&config.api.base_url)?;
    validate_timeout("api.read_timeout_secs", config.api.read_timeout_secs)?;
    validate_timeout("api.write_timeout_secs", config.api.write_timeout_secs)?;
    // keep_alive_secs of zero is legal: evict the moment the last
    // subscriber leaves
    Ok(())
}

fn validate_base_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(BackdeskError::Config(
            "api.base_url must not be empty".to_string(),
        ));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(BackdeskError::Config(format!(
            "api.base_url must start with http:// or https://, got '{url}'"
        )));
    }
    Ok(())
}

fn validate_timeout(field: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(BackdeskError::Config(format!(
            "{field} must be greater than zero"
        )));
    }
    if secs > MAX_TIMEOUT_SECS {
        return Err(BackdeskError::Config(format!(
            "{field} must be at most {MAX_TIMEOUT_SECS} seconds, got {secs}"
        )));
    }
    Ok(())
}
