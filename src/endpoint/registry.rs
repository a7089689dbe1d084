//! Endpoint registry
//!
//! All endpoints are declared up front and handed to the cache at
//! construction time. Lookups after that point are infallible in practice;
//! a miss means a typo in a caller and surfaces as `UnknownEndpoint`
//! rather than a panic.

use crate::endpoint::descriptor::{MutationEndpoint, QueryEndpoint};
use crate::error::{BackdeskError, Result};
use std::collections::HashMap;

/// Immutable-after-startup catalog of query and mutation endpoints
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    queries: HashMap<&'static str, QueryEndpoint>,
    mutations: HashMap<&'static str, MutationEndpoint>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query endpoint. Names are unique across both kinds.
    pub fn register_query(&mut self, endpoint: QueryEndpoint) -> Result<()> {
        let name = endpoint.name();
        if self.queries.contains_key(name) || self.mutations.contains_key(name) {
            return Err(BackdeskError::DuplicateEndpoint(name.to_string()));
        }
        self.queries.insert(name, endpoint);
        Ok(())
    }

    /// Register a mutation endpoint. Names are unique across both kinds.
    pub fn register_mutation(&mut self, endpoint: MutationEndpoint) -> Result<()> {
        let name = endpoint.name();
        if self.queries.contains_key(name) || self.mutations.contains_key(name) {
            return Err(BackdeskError::DuplicateEndpoint(name.to_string()));
        }
        self.mutations.insert(name, endpoint);
        Ok(())
    }

    pub fn query(&self, name: &str) -> Result<&QueryEndpoint> {
        self.queries
            .get(name)
            .ok_or_else(|| BackdeskError::UnknownEndpoint(name.to_string()))
    }

    pub fn mutation(&self, name: &str) -> Result<&MutationEndpoint> {
        self.mutations
            .get(name)
            .ok_or_else(|| BackdeskError::UnknownEndpoint(name.to_string()))
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    /// All registered names, sorted, for startup logging.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .queries
            .keys()
            .chain(self.mutations.keys())
            .copied()
            .collect();
        names.sort_unstable();
        names
    }
}
