//! Typed client facade
//!
//! `BackdeskClient` is the composition root: it builds the endpoint
//! registry, the HTTP backend, and one `QueryCache`, then exposes typed
//! wrappers so callers work with domain structs instead of raw JSON.
//! Query results come back as `Query<T>` handles that decode cache
//! snapshots; mutations are plain async calls.

use crate::api;
use crate::api::{
    BankPayment, BankPaymentFilter, BankReceipt, BankReceiptFilter, GenerateReportRequest,
    NewBankPayment, NewBankReceipt, Report, ReportFilter, ToggleFavoriteRequest,
    UpdateBankPayment, UpdateBankReceipt, UpdateNotesRequest, UpdateTagsRequest,
};
use crate::cache::{
    CacheOptions, CacheStats, QueryCache, QueryKey, QueryState, QueryStatus, SubscribeOptions,
    Subscription,
};
use crate::config::BackdeskConfig;
use crate::error::{BackdeskError, Result};
use crate::transport::{Backend, HttpBackend, Payload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

/// Client-side data layer of the back office: reports plus bank records,
/// all served through one tagged query cache.
pub struct BackdeskClient {
    cache: QueryCache,
}

impl BackdeskClient {
    /// Build from configuration: reqwest backend, full endpoint catalog.
    pub fn new(config: &BackdeskConfig) -> Result<Self> {
        config.validate()?;
        let backend = HttpBackend::new(config.api.base_url.clone())?
            .with_timeouts(config.api.read_timeout(), config.api.write_timeout());
        Self::with_backend(Arc::new(backend), config.cache_options())
    }

    /// Build over any transport. The seam tests use for scripted backends.
    pub fn with_backend(backend: Arc<dyn Backend>, options: CacheOptions) -> Result<Self> {
        let registry = api::endpoints()?;
        let cache = QueryCache::with_options(registry, backend, options);
        info!(
            endpoints = cache.endpoint_names().len(),
            "backdesk client ready"
        );
        Ok(Self { cache })
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Tear down the cache; open handles observe channel closure.
    pub fn dispose(&self) {
        self.cache.dispose();
    }

    // ---- reports ----

    pub fn list_reports(&self, filter: &ReportFilter) -> Result<Query<Vec<Report>>> {
        self.query(api::reports::LIST_REPORTS, filter)
    }

    pub fn get_report(&self, id: &str) -> Result<Query<Report>> {
        self.query(api::reports::GET_REPORT, &id)
    }

    /// Binary download; read the bytes off the subscription's snapshots.
    pub fn export_report(&self, id: &str) -> Result<Subscription> {
        self.cache
            .subscribe(api::reports::EXPORT_REPORT, serde_json::to_value(id)?)
    }

    pub async fn generate_report(&self, request: &GenerateReportRequest) -> Result<Report> {
        self.mutate(api::reports::GENERATE_REPORT, request).await
    }

    pub async fn delete_report(&self, id: &str) -> Result<()> {
        self.mutate_unit(api::reports::DELETE_REPORT, &id).await
    }

    pub async fn toggle_report_favorite(&self, request: &ToggleFavoriteRequest) -> Result<Report> {
        self.mutate(api::reports::TOGGLE_REPORT_FAVORITE, request)
            .await
    }

    pub async fn update_report_tags(&self, request: &UpdateTagsRequest) -> Result<Report> {
        self.mutate(api::reports::UPDATE_REPORT_TAGS, request).await
    }

    pub async fn update_report_notes(&self, request: &UpdateNotesRequest) -> Result<Report> {
        self.mutate(api::reports::UPDATE_REPORT_NOTES, request).await
    }

    // ---- bank payments ----

    pub fn list_bank_payments(
        &self,
        filter: &BankPaymentFilter,
    ) -> Result<Query<Vec<BankPayment>>> {
        self.query(api::bank_payments::LIST_BANK_PAYMENTS, filter)
    }

    pub fn get_bank_payment(&self, id: i64) -> Result<Query<BankPayment>> {
        self.query(api::bank_payments::GET_BANK_PAYMENT, &id)
    }

    pub async fn create_bank_payment(&self, new: &NewBankPayment) -> Result<BankPayment> {
        self.mutate(api::bank_payments::CREATE_BANK_PAYMENT, new)
            .await
    }

    pub async fn update_bank_payment(&self, update: &UpdateBankPayment) -> Result<BankPayment> {
        self.mutate(api::bank_payments::UPDATE_BANK_PAYMENT, update)
            .await
    }

    pub async fn delete_bank_payment(&self, id: i64) -> Result<()> {
        self.mutate_unit(api::bank_payments::DELETE_BANK_PAYMENT, &id)
            .await
    }

    // ---- bank receipts ----

    pub fn list_bank_receipts(
        &self,
        filter: &BankReceiptFilter,
    ) -> Result<Query<Vec<BankReceipt>>> {
        self.query(api::bank_receipts::LIST_BANK_RECEIPTS, filter)
    }

    pub fn get_bank_receipt(&self, id: i64) -> Result<Query<BankReceipt>> {
        self.query(api::bank_receipts::GET_BANK_RECEIPT, &id)
    }

    pub async fn create_bank_receipt(&self, new: &NewBankReceipt) -> Result<BankReceipt> {
        self.mutate(api::bank_receipts::CREATE_BANK_RECEIPT, new)
            .await
    }

    pub async fn update_bank_receipt(&self, update: &UpdateBankReceipt) -> Result<BankReceipt> {
        self.mutate(api::bank_receipts::UPDATE_BANK_RECEIPT, update)
            .await
    }

    pub async fn delete_bank_receipt(&self, id: i64) -> Result<()> {
        self.mutate_unit(api::bank_receipts::DELETE_BANK_RECEIPT, &id)
            .await
    }

    // ---- generic layer the wrappers sit on ----

    /// Subscribe to any registered query endpoint with a typed argument.
    pub fn query<T, A>(&self, endpoint: &str, arg: &A) -> Result<Query<T>>
    where
        T: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        self.query_with_options(endpoint, arg, SubscribeOptions::default())
    }

    pub fn query_with_options<T, A>(
        &self,
        endpoint: &str,
        arg: &A,
        options: SubscribeOptions,
    ) -> Result<Query<T>>
    where
        T: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        let arg = serde_json::to_value(arg)?;
        let subscription = self.cache.subscribe_with_options(endpoint, arg, options)?;
        Ok(Query::new(subscription))
    }

    /// Run any registered mutation with a typed argument and result.
    pub async fn mutate<T, A>(&self, endpoint: &str, arg: &A) -> Result<T>
    where
        T: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        let arg = serde_json::to_value(arg)?;
        let payload = self.cache.mutate(endpoint, arg).await?;
        decode_payload(&payload)
    }

    async fn mutate_unit<A>(&self, endpoint: &str, arg: &A) -> Result<()>
    where
        A: Serialize + ?Sized,
    {
        let arg = serde_json::to_value(arg)?;
        self.cache.mutate(endpoint, arg).await?;
        Ok(())
    }
}

impl fmt::Debug for BackdeskClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackdeskClient")
            .field("cache", &self.cache)
            .finish()
    }
}

/// Typed view over one cache subscription.
///
/// `ready` settles the current fetch cycle and decodes; `current` decodes
/// whatever data the snapshot holds right now, which keeps stale data
/// usable while a revalidation or a failed refetch is in progress.
/// Dropping the handle unsubscribes.
pub struct Query<T> {
    subscription: Subscription,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Query<T> {
    fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        self.subscription.key()
    }

    /// Raw snapshot, for status checks and stale-data display.
    pub fn state(&self) -> QueryState {
        self.subscription.state()
    }

    /// Wait for the fetch cycle to settle, then decode the result.
    ///
    /// Entry errors are shared between subscribers, hence the `Arc`.
    pub async fn ready(&mut self) -> std::result::Result<T, Arc<BackdeskError>> {
        let state = self.subscription.ready().await;
        match state.status {
            QueryStatus::Fulfilled => match state.data {
                Some(payload) => decode_payload(&payload).map_err(Arc::new),
                None => Err(Arc::new(BackdeskError::Disposed)),
            },
            QueryStatus::Rejected => {
                Err(state.error.unwrap_or_else(|| Arc::new(BackdeskError::Disposed)))
            }
            // ready() only returns unsettled when the cache went away
            _ => Err(Arc::new(BackdeskError::Disposed)),
        }
    }

    /// Decode the current snapshot's data, if any. Works while Pending
    /// (revalidation) and Rejected (stale display) alike.
    pub fn current(&self) -> Result<Option<T>> {
        match self.subscription.state().data {
            Some(payload) => decode_payload(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Force a fresh fetch for this entry.
    pub fn refetch(&self) -> Result<bool> {
        self.subscription.refetch()
    }

    /// Wait for the next snapshot; `None` once the entry is gone.
    pub async fn next_state(&mut self) -> Option<QueryState> {
        self.subscription.next_state().await
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("key", self.subscription.key())
            .finish_non_exhaustive()
    }
}

fn decode_payload<T: DeserializeOwned>(payload: &Payload) -> Result<T> {
    match payload.as_json() {
        Some(json) => serde_json::from_value(json.clone()).map_err(|e| {
            BackdeskError::Serialization(format!(
                "response did not match the expected type: {e}"
            ))
        }),
        None => Err(BackdeskError::Serialization(
            "binary payload where JSON was expected".to_string(),
        )),
    }
}
