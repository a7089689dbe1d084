//! Tag vocabulary of the catalog
//!
//! Kind constants plus the derivation helpers the endpoint declarations
//! share. Bank-record mutations invalidate a fixed set of cross-domain
//! collection tags: posting or editing a payment/receipt moves balances
//! that the customer, supplier, ledger, chart-of-accounts, and bank
//! screens all display.

use crate::tag::Tag;
use serde_json::Value;

pub const REPORTS: &str = "Reports";
pub const BANK_PAYMENTS: &str = "BankPayments";
pub const BANK_RECEIPTS: &str = "BankReceipts";

pub const CUSTOMERS: &str = "Customers";
pub const SUPPLIERS: &str = "Suppliers";
pub const LEDGER: &str = "Ledger";
pub const CHART_OF_ACCOUNTS: &str = "ChartOfAccounts";
pub const BANKS: &str = "Banks";

/// Item tag from a raw id value; string and numeric ids both occur.
pub fn id_tag(kind: &str, id: &Value) -> Option<Tag> {
    match id {
        Value::String(s) => Some(Tag::new(kind, s.as_str())),
        Value::Number(n) => n.as_i64().map(|n| Tag::new(kind, n)),
        _ => None,
    }
}

/// The collection tag plus one item tag per array element with an `id`.
///
/// Standard `provides` shape for list queries: invalidating any listed
/// item, or the collection itself, refetches the list.
pub fn collection_with_items(kind: &str, result: &Value) -> Vec<Tag> {
    let mut tags = vec![Tag::list(kind)];
    if let Some(items) = result.as_array() {
        for item in items {
            if let Some(tag) = item.get("id").and_then(|id| id_tag(kind, id)) {
                tags.push(tag);
            }
        }
    }
    tags
}

/// Collection tags refreshed by every bank-record mutation.
pub fn cross_domain_lists() -> Vec<Tag> {
    vec![
        Tag::list(CUSTOMERS),
        Tag::list(SUPPLIERS),
        Tag::list(LEDGER),
        Tag::list(CHART_OF_ACCOUNTS),
        Tag::list(BANKS),
    ]
}
