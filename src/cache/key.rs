//! Cache keys
//!
//! A key is the endpoint name plus the argument rendered to canonical
//! JSON. `serde_json` objects iterate in sorted key order, so two
//! deep-equal arguments built in different field orders render to the
//! same string and share one entry.

use serde_json::Value;
use std::fmt;

/// Identity of one cache entry: `(endpoint, canonical argument)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    endpoint: String,
    arg_json: String,
}

impl QueryKey {
    pub fn new(endpoint: &str, arg: &Value) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            arg_json: arg.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The canonical JSON rendering of the argument.
    pub fn arg_json(&self) -> &str {
        &self.arg_json
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.endpoint, self.arg_json)
    }
}
