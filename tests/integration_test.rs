//! Integration tests for the backdesk data layer
//!
//! The cache-behavior tests run against a scripted in-memory backend so
//! timing and responses are fully controlled; the HTTP tests run against
//! a real axum server bound to a local port.

use async_trait::async_trait;
use backdesk::api::{self, tags, ReportFilter, ToggleFavoriteRequest};
use backdesk::cache::{CacheOptions, MutateOptions, QueryCache, SubscribeOptions};
use backdesk::client::BackdeskClient;
use backdesk::endpoint::EndpointRequest;
use backdesk::error::{BackdeskError, Result};
use backdesk::retry::RetryConfig;
use backdesk::tag::Tag;
use backdesk::transport::{Backend, Payload};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer for an endpoint
#[derive(Debug, Clone)]
enum ScriptedResponse {
    Json(Value),
    Binary(Vec<u8>),
    Error(u16, String),
}

impl ScriptedResponse {
    fn into_result(self) -> Result<Payload> {
        match self {
            ScriptedResponse::Json(value) => Ok(Payload::Json(value)),
            ScriptedResponse::Binary(bytes) => Ok(Payload::Binary(bytes)),
            ScriptedResponse::Error(status, message) => {
                Err(BackdeskError::Server { status, message })
            }
        }
    }
}

/// In-memory backend with per-endpoint response queues and a call log.
///
/// Responses are consumed front to back; the final one sticks, so a
/// once-scripted endpoint answers every later call the same way.
/// Endpoints never scripted answer `null`.
struct ScriptedBackend {
    latency: Duration,
    log: Mutex<Vec<String>>,
    responses: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
}

impl ScriptedBackend {
    fn new() -> Arc<Self> {
        Self::with_latency(Duration::ZERO)
    }

    fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            log: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
        })
    }

    fn script(&self, endpoint: &str, response: Value) {
        self.push(endpoint, ScriptedResponse::Json(response));
    }

    fn script_binary(&self, endpoint: &str, bytes: &[u8]) {
        self.push(endpoint, ScriptedResponse::Binary(bytes.to_vec()));
    }

    fn script_error(&self, endpoint: &str, status: u16, message: &str) {
        self.push(endpoint, ScriptedResponse::Error(status, message.to_string()));
    }

    fn push(&self, endpoint: &str, response: ScriptedResponse) {
        self.responses
            .lock()
            .unwrap()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(response);
    }

    fn calls(&self, endpoint: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.as_str() == endpoint)
            .count()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn execute(&self, request: &EndpointRequest) -> Result<Payload> {
        self.log.lock().unwrap().push(request.endpoint.to_string());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = {
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(request.endpoint) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        next.unwrap_or(ScriptedResponse::Json(Value::Null)).into_result()
    }
}

fn scripted_cache(backend: Arc<ScriptedBackend>) -> QueryCache {
    QueryCache::new(api::endpoints().unwrap(), backend)
}

fn scripted_cache_with(backend: Arc<ScriptedBackend>, options: CacheOptions) -> QueryCache {
    QueryCache::with_options(api::endpoints().unwrap(), backend, options)
}

fn json_data(state: &backdesk::QueryState) -> Option<Value> {
    state
        .data
        .as_deref()
        .and_then(Payload::as_json)
        .cloned()
}

mod cache_properties {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_subscribes_share_one_fetch() {
        let backend = ScriptedBackend::with_latency(Duration::from_millis(40));
        backend.script("listReports", json!([{"id": "r1"}]));
        let cache = scripted_cache(backend.clone());

        let mut first = cache.subscribe("listReports", json!({})).unwrap();
        let mut second = cache.subscribe("listReports", json!({})).unwrap();

        let a = first.ready().await;
        let b = second.ready().await;

        assert!(a.is_fulfilled());
        assert!(b.is_fulfilled());
        assert_eq!(json_data(&a), json_data(&b));
        assert_eq!(backend.calls("listReports"), 1);
    }

    #[tokio::test]
    async fn test_invalidation_respects_tag_intersection() {
        let backend = ScriptedBackend::new();
        backend.script("getReport", json!({"id": "r1", "favorite": false}));
        backend.script("getBankPayment", json!({"id": 42}));
        let cache = scripted_cache(backend.clone());

        let mut report = cache.subscribe("getReport", json!("r1")).unwrap();
        let mut payment = cache.subscribe("getBankPayment", json!(42)).unwrap();
        report.ready().await;
        payment.ready().await;

        // favorite toggle invalidates (Reports, "r1") only
        cache
            .mutate(
                "toggleReportFavorite",
                json!({"id": "r1", "favorite": true}),
            )
            .await
            .unwrap();
        report.ready().await;

        assert_eq!(backend.calls("getReport"), 2);
        assert_eq!(backend.calls("getBankPayment"), 1);
    }

    #[tokio::test]
    async fn test_collection_tag_cascades_across_filters() {
        let backend = ScriptedBackend::new();
        backend.script("listReports", json!([{"id": "r1"}]));
        let cache = scripted_cache(backend.clone());

        let mut all = cache.subscribe("listReports", json!({})).unwrap();
        let mut favorites = cache
            .subscribe("listReports", json!({"favorite": true}))
            .unwrap();
        let mut payments = cache.subscribe("listBankPayments", json!({})).unwrap();
        all.ready().await;
        favorites.ready().await;
        payments.ready().await;
        assert_eq!(backend.calls("listReports"), 2);

        // generateReport invalidates (Reports, LIST); both report lists
        // refetch regardless of their filter arguments
        cache
            .mutate("generateReport", json!({"title": "Q1"}))
            .await
            .unwrap();
        all.ready().await;
        favorites.ready().await;

        assert_eq!(backend.calls("listReports"), 4);
        assert_eq!(backend.calls("listBankPayments"), 1);
    }

    #[tokio::test]
    async fn test_empty_invalidation_is_a_noop() {
        let backend = ScriptedBackend::new();
        backend.script("listReports", json!([{"id": "r1"}]));
        let cache = scripted_cache(backend.clone());

        let mut list = cache.subscribe("listReports", json!({})).unwrap();
        list.ready().await;

        cache.invalidate(&[]);

        let state = list.state();
        assert!(state.is_fulfilled());
        assert_eq!(json_data(&state), Some(json!([{"id": "r1"}])));
        assert_eq!(cache.stats().stale_entries, 0);
        assert_eq!(backend.calls("listReports"), 1);
    }

    #[tokio::test]
    async fn test_stale_data_visible_while_revalidating() {
        let backend = ScriptedBackend::new();
        backend.script("listReports", json!([{"id": "r1"}]));
        backend.script("listReports", json!([{"id": "r1"}, {"id": "r2"}]));
        let cache = scripted_cache(backend.clone());

        let mut list = cache.subscribe("listReports", json!({})).unwrap();
        list.ready().await;

        cache.invalidate(&[Tag::list(tags::REPORTS)]);

        // refetch has started but not resolved: old data, Pending status
        let during = list.state();
        assert!(during.is_pending());
        assert_eq!(json_data(&during), Some(json!([{"id": "r1"}])));

        let after = list.ready().await;
        assert!(after.is_fulfilled());
        assert_eq!(
            json_data(&after),
            Some(json!([{"id": "r1"}, {"id": "r2"}]))
        );
    }

    #[tokio::test]
    async fn test_resubscribe_within_keep_alive_reuses_entry() {
        let backend = ScriptedBackend::new();
        backend.script("listReports", json!([{"id": "r1"}]));
        let cache = scripted_cache_with(
            backend.clone(),
            CacheOptions {
                keep_alive: Duration::from_secs(30),
            },
        );

        let mut list = cache.subscribe("listReports", json!({})).unwrap();
        list.ready().await;
        drop(list);

        let again = cache.subscribe("listReports", json!({})).unwrap();
        assert!(again.state().is_fulfilled());
        assert_eq!(backend.calls("listReports"), 1);
    }

    #[tokio::test]
    async fn test_eviction_after_keep_alive_forces_fresh_fetch() {
        let backend = ScriptedBackend::new();
        backend.script("listReports", json!([{"id": "r1"}]));
        let cache = scripted_cache_with(
            backend.clone(),
            CacheOptions {
                keep_alive: Duration::from_millis(40),
            },
        );

        let mut list = cache.subscribe("listReports", json!({})).unwrap();
        list.ready().await;
        drop(list);
        assert_eq!(cache.stats().entries, 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.stats().entries, 0);

        let mut again = cache.subscribe("listReports", json!({})).unwrap();
        again.ready().await;
        assert_eq!(backend.calls("listReports"), 2);
    }

    #[tokio::test]
    async fn test_idle_entries_invalidate_lazily() {
        let backend = ScriptedBackend::new();
        backend.script("listReports", json!([{"id": "r1"}]));
        let cache = scripted_cache_with(
            backend.clone(),
            CacheOptions {
                keep_alive: Duration::from_secs(30),
            },
        );

        let mut list = cache.subscribe("listReports", json!({})).unwrap();
        list.ready().await;
        drop(list);

        // no subscriber: the entry is only marked stale, no refetch yet
        cache
            .mutate("generateReport", json!({"title": "Q1"}))
            .await
            .unwrap();
        assert_eq!(backend.calls("listReports"), 1);
        assert_eq!(cache.stats().stale_entries, 1);

        // the deferred refetch happens on the next subscription
        let mut again = cache.subscribe("listReports", json!({})).unwrap();
        again.ready().await;
        assert_eq!(backend.calls("listReports"), 2);
        assert_eq!(cache.stats().stale_entries, 0);
    }

    #[tokio::test]
    async fn test_rejected_entry_keeps_previous_data() {
        let backend = ScriptedBackend::new();
        backend.script("listReports", json!([{"id": "r1"}]));
        backend.script_error("listReports", 500, "database offline");
        backend.script("listReports", json!([{"id": "r1"}, {"id": "r2"}]));
        let cache = scripted_cache(backend.clone());

        let mut list = cache.subscribe("listReports", json!({})).unwrap();
        list.ready().await;

        list.refetch().unwrap();
        let rejected = list.ready().await;
        assert!(rejected.is_rejected());
        assert_eq!(json_data(&rejected), Some(json!([{"id": "r1"}])));
        let error = rejected.error.as_deref().unwrap();
        assert!(matches!(
            error,
            BackdeskError::Server { status: 500, .. }
        ));

        // manual refetch recovers
        list.refetch().unwrap();
        let recovered = list.ready().await;
        assert!(recovered.is_fulfilled());
        assert!(recovered.error.is_none());
        assert_eq!(
            json_data(&recovered),
            Some(json!([{"id": "r1"}, {"id": "r2"}]))
        );
    }

    #[tokio::test]
    async fn test_resubscribe_to_rejected_entry_does_not_refetch() {
        let backend = ScriptedBackend::new();
        backend.script_error("listReports", 500, "database offline");
        backend.script("listReports", json!([{"id": "r1"}]));
        let cache = scripted_cache(backend.clone());

        let mut first = cache.subscribe("listReports", json!({})).unwrap();
        assert!(first.ready().await.is_rejected());
        assert_eq!(backend.calls("listReports"), 1);

        // a later subscriber sees the rejection as stored, without a
        // fresh network call
        let mut second = cache.subscribe("listReports", json!({})).unwrap();
        let state = second.state();
        assert!(state.is_rejected());
        let error = state.error.as_deref().unwrap();
        assert!(matches!(
            error,
            BackdeskError::Server { status: 500, .. }
        ));
        assert_eq!(backend.calls("listReports"), 1);

        // recovery stays explicit: only a refetch issues the call
        second.refetch().unwrap();
        let recovered = second.ready().await;
        assert!(recovered.is_fulfilled());
        assert_eq!(json_data(&recovered), Some(json!([{"id": "r1"}])));
        assert_eq!(backend.calls("listReports"), 2);
    }

    #[tokio::test]
    async fn test_invalidation_recovers_rejected_entry() {
        let backend = ScriptedBackend::new();
        backend.script("listReports", json!([{"id": "r1"}]));
        backend.script_error("listReports", 500, "database offline");
        backend.script("listReports", json!([{"id": "r1"}, {"id": "r2"}]));
        let cache = scripted_cache(backend.clone());

        let mut list = cache.subscribe("listReports", json!({})).unwrap();
        list.ready().await;
        list.refetch().unwrap();
        assert!(list.ready().await.is_rejected());
        assert_eq!(backend.calls("listReports"), 2);

        // tags from the last success are retained, so the collection
        // invalidation reaches the rejected entry and restarts it
        cache
            .mutate("generateReport", json!({"title": "Q1"}))
            .await
            .unwrap();
        let state = list.ready().await;

        assert!(state.is_fulfilled());
        assert!(state.error.is_none());
        assert_eq!(
            json_data(&state),
            Some(json!([{"id": "r1"}, {"id": "r2"}]))
        );
        assert_eq!(backend.calls("listReports"), 3);
    }

    #[tokio::test]
    async fn test_fetch_resolving_without_subscribers_is_discarded() {
        let backend = ScriptedBackend::with_latency(Duration::from_millis(40));
        backend.script("listReports", json!([{"id": "r1"}]));
        let cache = scripted_cache_with(
            backend.clone(),
            CacheOptions {
                keep_alive: Duration::from_secs(30),
            },
        );

        let list = cache.subscribe("listReports", json!({})).unwrap();
        drop(list); // unsubscribe while the fetch is still in flight

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.calls("listReports"), 1);

        // the discarded response must not have populated the entry
        let mut again = cache.subscribe("listReports", json!({})).unwrap();
        assert!(!again.state().is_fulfilled());
        again.ready().await;
        assert_eq!(backend.calls("listReports"), 2);
    }

    #[tokio::test]
    async fn test_retry_is_opt_in_per_subscription() {
        let backend = ScriptedBackend::new();
        backend.script_error("listReports", 500, "hiccup");
        backend.script_error("listReports", 500, "hiccup");
        backend.script("listReports", json!([{"id": "r1"}]));
        let cache = scripted_cache(backend.clone());

        let mut list = cache
            .subscribe_with_options(
                "listReports",
                json!({}),
                SubscribeOptions::with_retry(RetryConfig::quick()),
            )
            .unwrap();

        let state = list.ready().await;
        assert!(state.is_fulfilled());
        assert_eq!(backend.calls("listReports"), 3);
    }

    #[tokio::test]
    async fn test_mutation_retry_is_opt_in() {
        let backend = ScriptedBackend::new();
        backend.script("listReports", json!([{"id": "r1"}]));
        backend.script_error("generateReport", 503, "maintenance window");
        backend.script("generateReport", json!({"id": "r9"}));
        let cache = scripted_cache(backend.clone());

        let mut list = cache.subscribe("listReports", json!({})).unwrap();
        list.ready().await;

        let payload = cache
            .mutate_with_options(
                "generateReport",
                json!({"title": "Q1"}),
                MutateOptions::with_retry(RetryConfig::quick()),
            )
            .await
            .unwrap();

        assert_eq!(payload.as_json(), Some(&json!({"id": "r9"})));
        assert_eq!(backend.calls("generateReport"), 2);

        // the retried success still invalidates and refreshes the list
        assert!(list.ready().await.is_fulfilled());
        assert_eq!(backend.calls("listReports"), 2);
    }

    #[tokio::test]
    async fn test_no_retry_without_opt_in() {
        let backend = ScriptedBackend::new();
        backend.script_error("listReports", 500, "hiccup");
        backend.script("listReports", json!([]));
        let cache = scripted_cache(backend.clone());

        let mut list = cache.subscribe("listReports", json!({})).unwrap();
        let state = list.ready().await;

        assert!(state.is_rejected());
        assert_eq!(backend.calls("listReports"), 1);
    }
}

mod report_scenarios {
    use super::*;

    fn client_over(backend: Arc<ScriptedBackend>) -> BackdeskClient {
        BackdeskClient::with_backend(backend, CacheOptions::default()).unwrap()
    }

    fn report_json(id: &str, favorite: bool) -> Value {
        json!({
            "id": id,
            "title": format!("Report {id}"),
            "kind": "summary",
            "status": "completed",
            "from": "2026-01-01",
            "to": "2026-01-31",
            "favorite": favorite,
            "createdAt": "2026-02-01T08:30:00Z"
        })
    }

    #[tokio::test]
    async fn test_delete_report_refreshes_list() {
        let backend = ScriptedBackend::new();
        backend.script(
            "listReports",
            json!([report_json("r1", false), report_json("r2", false)]),
        );
        backend.script("listReports", json!([report_json("r2", false)]));
        let client = client_over(backend.clone());

        let mut list = client.list_reports(&ReportFilter::default()).unwrap();
        let before = list.ready().await.unwrap();
        assert_eq!(before.len(), 2);

        client.delete_report("r1").await.unwrap();

        let after = list.ready().await.unwrap();
        assert_eq!(after.len(), 1);
        assert!(after.iter().all(|report| report.id != "r1"));
        assert_eq!(backend.calls("listReports"), 2);
        assert_eq!(backend.calls("deleteReport"), 1);
    }

    #[tokio::test]
    async fn test_favorite_toggle_refreshes_detail() {
        let backend = ScriptedBackend::new();
        backend.script("getReport", report_json("r1", false));
        backend.script("getReport", report_json("r1", true));
        backend.script("toggleReportFavorite", report_json("r1", true));
        let client = client_over(backend.clone());

        let mut detail = client.get_report("r1").unwrap();
        assert!(!detail.ready().await.unwrap().favorite);

        let updated = client
            .toggle_report_favorite(&ToggleFavoriteRequest {
                id: "r1".to_string(),
                favorite: true,
            })
            .await
            .unwrap();
        assert!(updated.favorite);

        assert!(detail.ready().await.unwrap().favorite);
        assert_eq!(backend.calls("getReport"), 2);
    }

    #[tokio::test]
    async fn test_export_is_binary_and_never_invalidated() {
        let backend = ScriptedBackend::new();
        backend.script_binary("exportReport", b"%PDF-1.7 january");
        let client = client_over(backend.clone());

        let mut export = client.export_report("r1").unwrap();
        let state = export.ready().await;
        assert_eq!(
            state.data.as_deref().and_then(Payload::as_bytes),
            Some(&b"%PDF-1.7 january"[..])
        );

        // binary entries carry no tags, so report mutations leave them be
        client.delete_report("r1").await.unwrap();
        assert_eq!(backend.calls("exportReport"), 1);
    }
}

mod http_round_trip {
    use super::*;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use backdesk::config::BackdeskConfig;

    #[derive(Clone)]
    struct ServerState {
        reports: Arc<Mutex<Vec<Value>>>,
    }

    async fn list_reports(
        State(state): State<ServerState>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let favorite = params.get("favorite").map(|v| v == "true");
        let reports = state.reports.lock().unwrap();
        let filtered: Vec<Value> = reports
            .iter()
            .filter(|report| {
                favorite
                    .map(|want| report["favorite"].as_bool().unwrap_or(false) == want)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        Json(Value::Array(filtered))
    }

    async fn get_report(
        State(state): State<ServerState>,
        Path(id): Path<String>,
    ) -> std::result::Result<Json<Value>, (StatusCode, Json<Value>)> {
        let reports = state.reports.lock().unwrap();
        reports
            .iter()
            .find(|report| report["id"] == json!(id))
            .cloned()
            .map(Json)
            .ok_or((
                StatusCode::NOT_FOUND,
                Json(json!({"message": "report not found"})),
            ))
    }

    async fn delete_report(
        State(state): State<ServerState>,
        Path(id): Path<String>,
    ) -> StatusCode {
        state
            .reports
            .lock()
            .unwrap()
            .retain(|report| report["id"] != json!(id));
        StatusCode::NO_CONTENT
    }

    async fn spawn_server(reports: Vec<Value>) -> String {
        let state = ServerState {
            reports: Arc::new(Mutex::new(reports)),
        };
        let app = Router::new()
            .route("/api/reports", get(list_reports))
            .route("/api/reports/{id}", get(get_report).delete(delete_report))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn seed_reports() -> Vec<Value> {
        vec![
            json!({
                "id": "r1",
                "title": "January summary",
                "kind": "summary",
                "status": "completed",
                "from": "2026-01-01",
                "to": "2026-01-31",
                "favorite": true,
                "createdAt": "2026-02-01T08:30:00Z"
            }),
            json!({
                "id": "r2",
                "title": "February summary",
                "kind": "summary",
                "status": "completed",
                "from": "2026-02-01",
                "to": "2026-02-28",
                "favorite": false,
                "createdAt": "2026-03-01T08:30:00Z"
            }),
        ]
    }

    #[tokio::test]
    async fn test_list_delete_list_over_http() {
        let base_url = spawn_server(seed_reports()).await;

        let mut config = BackdeskConfig::default();
        config.api.base_url = base_url;
        let client = BackdeskClient::new(&config).unwrap();

        let mut list = client.list_reports(&ReportFilter::default()).unwrap();
        assert_eq!(list.ready().await.unwrap().len(), 2);

        client.delete_report("r1").await.unwrap();

        let after = list.ready().await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, "r2");
    }

    #[tokio::test]
    async fn test_query_params_reach_the_server() {
        let base_url = spawn_server(seed_reports()).await;

        let mut config = BackdeskConfig::default();
        config.api.base_url = base_url;
        let client = BackdeskClient::new(&config).unwrap();

        let filter = ReportFilter {
            favorite: Some(true),
            ..ReportFilter::default()
        };
        let mut favorites = client.list_reports(&filter).unwrap();
        let reports = favorites.ready().await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, "r1");
    }

    #[tokio::test]
    async fn test_not_found_maps_to_server_failure() {
        let base_url = spawn_server(seed_reports()).await;

        let mut config = BackdeskConfig::default();
        config.api.base_url = base_url;
        let client = BackdeskClient::new(&config).unwrap();

        let mut missing = client.get_report("r999").unwrap();
        let err = missing.ready().await.unwrap_err();

        match &*err {
            BackdeskError::Server { status, message } => {
                assert_eq!(*status, 404);
                assert_eq!(message, "report not found");
            }
            other => panic!("expected server failure, got {other:?}"),
        }
    }
}
