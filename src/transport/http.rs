//! HTTP backend over reqwest

use crate::endpoint::{EndpointRequest, Method, ResponseKind};
use crate::error::{BackdeskError, Result};
use crate::transport::{Backend, Payload};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Timeout for reads (GET)
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for writes (POST/PUT/DELETE); report generation can be slow
const WRITE_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest error-body excerpt carried into `ServerFailure` messages
const ERROR_BODY_LIMIT: usize = 200;

/// Production backend speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("backdesk/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            read_timeout: READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
        })
    }

    /// Override the default per-verb timeouts (from configuration).
    pub fn with_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn execute(&self, request: &EndpointRequest) -> Result<Payload> {
        let url = self.url_for(&request.path);
        debug!(
            endpoint = request.endpoint,
            method = %request.method,
            url = %url,
            "executing request"
        );

        let mut builder = match request.method {
            Method::Get => self.client.get(&url).timeout(self.read_timeout),
            Method::Post => self.client.post(&url).timeout(self.write_timeout),
            Method::Put => self.client.put(&url).timeout(self.write_timeout),
            Method::Delete => self.client.delete(&url).timeout(self.write_timeout),
        };

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackdeskError::Server {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        match request.response {
            ResponseKind::Binary => {
                let bytes = response.bytes().await?;
                Ok(Payload::Binary(bytes.to_vec()))
            }
            ResponseKind::Json => {
                // 204 responses and empty bodies are legitimate for writes
                if status == StatusCode::NO_CONTENT {
                    return Ok(Payload::Json(Value::Null));
                }
                let text = response.text().await?;
                Ok(Payload::Json(parse_json_body(request.endpoint, &text)?))
            }
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn parse_json_body(endpoint: &str, text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| {
        BackdeskError::Serialization(format!("invalid JSON from {endpoint}: {e}"))
    })
}

/// Pull a human-readable message out of an error response body.
///
/// Servers here usually answer `{"message": "..."}` or `{"error": "..."}`;
/// anything else is passed through truncated.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    let mut excerpt: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
    if excerpt.len() < trimmed.len() {
        excerpt.push_str("...");
    }
    excerpt
}
