//! Transport backends
//!
//! The cache core talks to the network through the `Backend` trait so
//! tests can substitute a scripted implementation. The production backend
//! is `HttpBackend` over reqwest.

pub mod http;

use crate::endpoint::EndpointRequest;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

pub use http::HttpBackend;

/// Response payload as stored by the cache
#[derive(Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON document
    Json(Value),
    /// Opaque bytes from a binary endpoint (report exports)
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Binary(bytes) => Some(bytes),
            Payload::Json(_) => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Payload::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
        }
    }
}

/// Executes shaped endpoint requests against a server
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(&self, request: &EndpointRequest) -> Result<Payload>;
}
