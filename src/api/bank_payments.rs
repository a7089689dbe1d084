//! Bank payment records
//!
//! Money leaving the business: supplier invoices, fees, transfers out.
//! Posting or editing one shifts balances shown on the customer,
//! supplier, ledger, chart-of-accounts, and bank screens, so every
//! mutation here invalidates those collections alongside its own.

use crate::api::tags;
use crate::endpoint::{body_without_id, EndpointRegistry, MutationEndpoint, QueryEndpoint};
use crate::error::Result;
use crate::tag::Tag;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LIST_BANK_PAYMENTS: &str = "listBankPayments";
pub const GET_BANK_PAYMENT: &str = "getBankPayment";
pub const CREATE_BANK_PAYMENT: &str = "createBankPayment";
pub const UPDATE_BANK_PAYMENT: &str = "updateBankPayment";
pub const DELETE_BANK_PAYMENT: &str = "deleteBankPayment";

/// One outgoing payment as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankPayment {
    pub id: i64,
    pub date: NaiveDate,
    /// Amount in minor units (cents); currency alongside
    pub amount_minor: i64,
    pub currency: String,
    pub payee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<i64>,
    pub bank_account_id: i64,
    pub ledger_account_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Argument of `createBankPayment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBankPayment {
    pub date: NaiveDate,
    pub amount_minor: i64,
    pub currency: String,
    pub payee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<i64>,
    pub bank_account_id: i64,
    pub ledger_account_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Argument of `updateBankPayment`; the id travels in the path, the rest
/// in the body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBankPayment {
    pub id: i64,
    pub date: NaiveDate,
    pub amount_minor: i64,
    pub currency: String,
    pub payee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<i64>,
    pub bank_account_id: i64,
    pub ledger_account_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Filter for `listBankPayments`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankPaymentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account_id: Option<i64>,
}

fn payment_path(arg: &Value) -> String {
    format!("bank-payments/{}", arg.as_i64().unwrap_or_default())
}

fn list_tags(result: &Value, _arg: &Value) -> Vec<Tag> {
    tags::collection_with_items(tags::BANK_PAYMENTS, result)
}

fn item_tags(_result: &Value, arg: &Value) -> Vec<Tag> {
    tags::id_tag(tags::BANK_PAYMENTS, arg).into_iter().collect()
}

/// Collection tag, optional item tag, and the cross-domain set.
fn mutation_tags(item: Option<Tag>) -> Vec<Tag> {
    let mut out: Vec<Tag> = item.into_iter().collect();
    out.push(Tag::list(tags::BANK_PAYMENTS));
    out.extend(tags::cross_domain_lists());
    out
}

pub(crate) fn register(registry: &mut EndpointRegistry) -> Result<()> {
    registry.register_query(
        QueryEndpoint::get(LIST_BANK_PAYMENTS, |_| "bank-payments".to_string(), list_tags)
            .with_arg_params(),
    )?;
    registry.register_query(QueryEndpoint::get(GET_BANK_PAYMENT, payment_path, item_tags))?;

    registry.register_mutation(MutationEndpoint::post(
        CREATE_BANK_PAYMENT,
        |_| "bank-payments".to_string(),
        |_arg, _result| mutation_tags(None),
    ))?;

    registry.register_mutation(
        MutationEndpoint::put(
            UPDATE_BANK_PAYMENT,
            |arg| format!("bank-payments/{}", arg["id"].as_i64().unwrap_or_default()),
            |arg, _result| mutation_tags(tags::id_tag(tags::BANK_PAYMENTS, &arg["id"])),
        )
        .with_body(body_without_id),
    )?;

    registry.register_mutation(MutationEndpoint::delete(
        DELETE_BANK_PAYMENT,
        payment_path,
        |arg, _result| mutation_tags(tags::id_tag(tags::BANK_PAYMENTS, arg)),
    ))?;

    Ok(())
}
