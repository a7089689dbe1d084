//! Endpoint descriptors
//!
//! A descriptor is the declarative record of one server operation: how the
//! argument becomes an HTTP request, and how results map to invalidation
//! tags. The tag functions are plain data (boxed closures) so the cache
//! core stays free of any per-domain knowledge; the `api` module supplies
//! the concrete catalog.

use crate::tag::Tag;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// HTTP verb for an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expected response body shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Parsed as JSON; eligible for tag derivation
    Json,
    /// Opaque bytes (exports/downloads); stored as-is, never parsed, never tagged
    Binary,
}

/// One fully-shaped request, ready for a transport backend
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    /// Declared endpoint name (for logs and backends that route by name)
    pub endpoint: &'static str,
    pub method: Method,
    /// Path relative to the configured base URL, e.g. "bank-payments/42"
    pub path: String,
    /// Query-string parameters (GET endpoints)
    pub params: Vec<(String, String)>,
    /// JSON body (mutating verbs)
    pub body: Option<Value>,
    pub response: ResponseKind,
}

type PathFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;
type ParamsFn = Arc<dyn Fn(&Value) -> Vec<(String, String)> + Send + Sync>;
type BodyFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Tag-derivation function for queries: `(result, argument) -> tags`
pub type ProvidesTags = Arc<dyn Fn(&Value, &Value) -> Vec<Tag> + Send + Sync>;

/// Tag-derivation function for mutations: `(argument, result) -> tags`
pub type InvalidatesTags = Arc<dyn Fn(&Value, &Value) -> Vec<Tag> + Send + Sync>;

/// Flatten a JSON object argument into query-string parameters.
///
/// Top-level scalar fields become `key=value` pairs; `null` fields are
/// omitted so optional filters disappear from the wire. Non-object
/// arguments produce no parameters.
pub fn arg_query_params(arg: &Value) -> Vec<(String, String)> {
    let Some(map) = arg.as_object() else {
        return Vec::new();
    };

    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let rendered = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), rendered)
        })
        .collect()
}

/// Request body for update mutations whose id travels in the path: the
/// argument object minus its `id` field.
pub fn body_without_id(arg: &Value) -> Option<Value> {
    let mut body = arg.clone();
    if let Some(map) = body.as_object_mut() {
        map.remove("id");
    }
    Some(body)
}

/// Declaration of a cacheable read
#[derive(Clone)]
pub struct QueryEndpoint {
    name: &'static str,
    method: Method,
    response: ResponseKind,
    path: PathFn,
    params: Option<ParamsFn>,
    provides: ProvidesTags,
}

impl QueryEndpoint {
    /// Declare a GET query.
    pub fn get(
        name: &'static str,
        path: impl Fn(&Value) -> String + Send + Sync + 'static,
        provides: impl Fn(&Value, &Value) -> Vec<Tag> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            method: Method::Get,
            response: ResponseKind::Json,
            path: Arc::new(path),
            params: None,
            provides: Arc::new(provides),
        }
    }

    /// Send the argument object's fields as query-string parameters.
    pub fn with_arg_params(mut self) -> Self {
        self.params = Some(Arc::new(arg_query_params));
        self
    }

    /// Mark the response as opaque bytes. Binary results are stored but
    /// never parsed, and carry no tags.
    pub fn binary(mut self) -> Self {
        self.response = ResponseKind::Binary;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn response(&self) -> ResponseKind {
        self.response
    }

    /// Shape the request for a given argument.
    pub fn request(&self, arg: &Value) -> EndpointRequest {
        EndpointRequest {
            endpoint: self.name,
            method: self.method,
            path: (self.path)(arg),
            params: self
                .params
                .as_ref()
                .map(|f| f(arg))
                .unwrap_or_default(),
            body: None,
            response: self.response,
        }
    }

    /// Tags provided by a successful result. Binary responses provide none.
    pub fn provided_tags(&self, result: &Value, arg: &Value) -> Vec<Tag> {
        match self.response {
            ResponseKind::Json => (self.provides)(result, arg),
            ResponseKind::Binary => Vec::new(),
        }
    }
}

impl fmt::Debug for QueryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEndpoint")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// Declaration of a side-effecting write
#[derive(Clone)]
pub struct MutationEndpoint {
    name: &'static str,
    method: Method,
    path: PathFn,
    body: BodyFn,
    invalidates: InvalidatesTags,
}

impl MutationEndpoint {
    fn new(
        name: &'static str,
        method: Method,
        path: impl Fn(&Value) -> String + Send + Sync + 'static,
        invalidates: impl Fn(&Value, &Value) -> Vec<Tag> + Send + Sync + 'static,
    ) -> Self {
        // POST and PUT carry the whole argument by default; DELETE carries
        // nothing. `with_body` overrides either.
        let default_body: BodyFn = match method {
            Method::Post | Method::Put => Arc::new(|arg: &Value| Some(arg.clone())),
            _ => Arc::new(|_: &Value| None),
        };

        Self {
            name,
            method,
            path: Arc::new(path),
            body: default_body,
            invalidates: Arc::new(invalidates),
        }
    }

    /// Declare a POST mutation (body defaults to the full argument).
    pub fn post(
        name: &'static str,
        path: impl Fn(&Value) -> String + Send + Sync + 'static,
        invalidates: impl Fn(&Value, &Value) -> Vec<Tag> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, Method::Post, path, invalidates)
    }

    /// Declare a PUT mutation (body defaults to the full argument).
    pub fn put(
        name: &'static str,
        path: impl Fn(&Value) -> String + Send + Sync + 'static,
        invalidates: impl Fn(&Value, &Value) -> Vec<Tag> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, Method::Put, path, invalidates)
    }

    /// Declare a DELETE mutation (no body by default).
    pub fn delete(
        name: &'static str,
        path: impl Fn(&Value) -> String + Send + Sync + 'static,
        invalidates: impl Fn(&Value, &Value) -> Vec<Tag> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, Method::Delete, path, invalidates)
    }

    /// Override the request body derivation.
    pub fn with_body(
        mut self,
        body: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.body = Arc::new(body);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Shape the request for a given argument.
    pub fn request(&self, arg: &Value) -> EndpointRequest {
        EndpointRequest {
            endpoint: self.name,
            method: self.method,
            path: (self.path)(arg),
            params: Vec::new(),
            body: (self.body)(arg),
            response: ResponseKind::Json,
        }
    }

    /// Tags this mutation invalidates once it has succeeded.
    pub fn invalidated_tags(&self, arg: &Value, result: &Value) -> Vec<Tag> {
        (self.invalidates)(arg, result)
    }
}

impl fmt::Debug for MutationEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationEndpoint")
            .field("name", &self.name)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}
