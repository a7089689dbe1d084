//! Sales-performance reports
//!
//! Reports are generated server-side from posted sales data; the client
//! lists them, reads them, tweaks workflow fields (favorite, tags,
//! notes), deletes them, and downloads finished ones as opaque exports.

use crate::api::tags;
use crate::endpoint::{EndpointRegistry, MutationEndpoint, QueryEndpoint};
use crate::error::Result;
use crate::tag::Tag;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const LIST_REPORTS: &str = "listReports";
pub const GET_REPORT: &str = "getReport";
pub const EXPORT_REPORT: &str = "exportReport";
pub const GENERATE_REPORT: &str = "generateReport";
pub const DELETE_REPORT: &str = "deleteReport";
pub const TOGGLE_REPORT_FAVORITE: &str = "toggleReportFavorite";
pub const UPDATE_REPORT_TAGS: &str = "updateReportTags";
pub const UPDATE_REPORT_NOTES: &str = "updateReportNotes";

/// What the report aggregates over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    SalesByCustomer,
    SalesByItem,
    SalesByStaff,
    Summary,
}

/// Server-side generation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// One generated report as the server lists it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub title: String,
    pub kind: ReportKind,
    pub status: ReportStatus,
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Filter for `listReports`; every field is optional and omitted fields
/// stay out of the cache key and the query string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReportKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// Argument of `generateReport`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportRequest {
    pub title: String,
    pub kind: ReportKind,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Argument of `toggleReportFavorite`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFavoriteRequest {
    pub id: String,
    pub favorite: bool,
}

/// Argument of `updateReportTags`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagsRequest {
    pub id: String,
    pub tags: Vec<String>,
}

/// Argument of `updateReportNotes`; `notes: None` clears them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotesRequest {
    pub id: String,
    pub notes: Option<String>,
}

fn report_path(arg: &Value) -> String {
    format!("reports/{}", arg.as_str().unwrap_or_default())
}

fn workflow_path(arg: &Value, suffix: &str) -> String {
    format!(
        "reports/{}/{}",
        arg["id"].as_str().unwrap_or_default(),
        suffix
    )
}

fn list_tags(result: &Value, _arg: &Value) -> Vec<Tag> {
    tags::collection_with_items(tags::REPORTS, result)
}

fn item_tags(_result: &Value, arg: &Value) -> Vec<Tag> {
    tags::id_tag(tags::REPORTS, arg).into_iter().collect()
}

fn workflow_tags(arg: &Value, _result: &Value) -> Vec<Tag> {
    tags::id_tag(tags::REPORTS, &arg["id"]).into_iter().collect()
}

pub(crate) fn register(registry: &mut EndpointRegistry) -> Result<()> {
    registry.register_query(
        QueryEndpoint::get(LIST_REPORTS, |_| "reports".to_string(), list_tags)
            .with_arg_params(),
    )?;
    registry.register_query(QueryEndpoint::get(GET_REPORT, report_path, item_tags))?;
    registry.register_query(
        QueryEndpoint::get(
            EXPORT_REPORT,
            |arg| format!("{}/export", report_path(arg)),
            |_result, _arg| Vec::new(),
        )
        .binary(),
    )?;

    registry.register_mutation(MutationEndpoint::post(
        GENERATE_REPORT,
        |_| "reports".to_string(),
        |_arg, _result| vec![Tag::list(tags::REPORTS)],
    ))?;

    registry.register_mutation(MutationEndpoint::delete(
        DELETE_REPORT,
        report_path,
        |arg, _result| {
            let mut out = vec![Tag::list(tags::REPORTS)];
            out.extend(tags::id_tag(tags::REPORTS, arg));
            out
        },
    ))?;

    registry.register_mutation(
        MutationEndpoint::put(
            TOGGLE_REPORT_FAVORITE,
            |arg| workflow_path(arg, "favorite"),
            workflow_tags,
        )
        .with_body(|arg| Some(json!({"favorite": arg["favorite"]}))),
    )?;

    registry.register_mutation(
        MutationEndpoint::put(
            UPDATE_REPORT_TAGS,
            |arg| workflow_path(arg, "tags"),
            workflow_tags,
        )
        .with_body(|arg| Some(json!({"tags": arg["tags"]}))),
    )?;

    registry.register_mutation(
        MutationEndpoint::put(
            UPDATE_REPORT_NOTES,
            |arg| workflow_path(arg, "notes"),
            workflow_tags,
        )
        .with_body(|arg| Some(json!({"notes": arg["notes"]}))),
    )?;

    Ok(())
}
