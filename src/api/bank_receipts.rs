//! Bank receipt records
//!
//! Money coming in: customer payments, refunds, interest. Mirrors the
//! payment module with the customer on the counterparty side; mutations
//! invalidate the same cross-domain collections.

use crate::api::tags;
use crate::endpoint::{body_without_id, EndpointRegistry, MutationEndpoint, QueryEndpoint};
use crate::error::Result;
use crate::tag::Tag;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LIST_BANK_RECEIPTS: &str = "listBankReceipts";
pub const GET_BANK_RECEIPT: &str = "getBankReceipt";
pub const CREATE_BANK_RECEIPT: &str = "createBankReceipt";
pub const UPDATE_BANK_RECEIPT: &str = "updateBankReceipt";
pub const DELETE_BANK_RECEIPT: &str = "deleteBankReceipt";

/// One incoming payment as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankReceipt {
    pub id: i64,
    pub date: NaiveDate,
    pub amount_minor: i64,
    pub currency: String,
    pub payer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    pub bank_account_id: i64,
    pub ledger_account_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Argument of `createBankReceipt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBankReceipt {
    pub date: NaiveDate,
    pub amount_minor: i64,
    pub currency: String,
    pub payer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    pub bank_account_id: i64,
    pub ledger_account_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Argument of `updateBankReceipt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBankReceipt {
    pub id: i64,
    pub date: NaiveDate,
    pub amount_minor: i64,
    pub currency: String,
    pub payer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    pub bank_account_id: i64,
    pub ledger_account_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Filter for `listBankReceipts`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankReceiptFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account_id: Option<i64>,
}

fn receipt_path(arg: &Value) -> String {
    format!("bank-receipts/{}", arg.as_i64().unwrap_or_default())
}

fn list_tags(result: &Value, _arg: &Value) -> Vec<Tag> {
    tags::collection_with_items(tags::BANK_RECEIPTS, result)
}

fn item_tags(_result: &Value, arg: &Value) -> Vec<Tag> {
    tags::id_tag(tags::BANK_RECEIPTS, arg).into_iter().collect()
}

fn mutation_tags(item: Option<Tag>) -> Vec<Tag> {
    let mut out: Vec<Tag> = item.into_iter().collect();
    out.push(Tag::list(tags::BANK_RECEIPTS));
    out.extend(tags::cross_domain_lists());
    out
}

pub(crate) fn register(registry: &mut EndpointRegistry) -> Result<()> {
    registry.register_query(
        QueryEndpoint::get(LIST_BANK_RECEIPTS, |_| "bank-receipts".to_string(), list_tags)
            .with_arg_params(),
    )?;
    registry.register_query(QueryEndpoint::get(GET_BANK_RECEIPT, receipt_path, item_tags))?;

    registry.register_mutation(MutationEndpoint::post(
        CREATE_BANK_RECEIPT,
        |_| "bank-receipts".to_string(),
        |_arg, _result| mutation_tags(None),
    ))?;

    registry.register_mutation(
        MutationEndpoint::put(
            UPDATE_BANK_RECEIPT,
            |arg| format!("bank-receipts/{}", arg["id"].as_i64().unwrap_or_default()),
            |arg, _result| mutation_tags(tags::id_tag(tags::BANK_RECEIPTS, &arg["id"])),
        )
        .with_body(body_without_id),
    )?;

    registry.register_mutation(MutationEndpoint::delete(
        DELETE_BANK_RECEIPT,
        receipt_path,
        |arg, _result| mutation_tags(tags::id_tag(tags::BANK_RECEIPTS, arg)),
    ))?;

    Ok(())
}
