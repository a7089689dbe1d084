//! The endpoint catalog
//!
//! Every server operation the client uses, declared as data: request
//! shaping on one side, tag derivation on the other. `endpoints()` builds
//! the whole registry up front; the cache never learns an endpoint after
//! that. List endpoints return bare JSON arrays and provide one item tag
//! per element plus their collection tag.

pub mod bank_payments;
pub mod bank_receipts;
pub mod reports;
pub mod tags;

use crate::endpoint::EndpointRegistry;
use crate::error::Result;

pub use bank_payments::{BankPayment, BankPaymentFilter, NewBankPayment, UpdateBankPayment};
pub use bank_receipts::{BankReceipt, BankReceiptFilter, NewBankReceipt, UpdateBankReceipt};
pub use reports::{
    GenerateReportRequest, Report, ReportFilter, ReportKind, ReportStatus,
    ToggleFavoriteRequest, UpdateNotesRequest, UpdateTagsRequest,
};

/// Build the full endpoint registry.
pub fn endpoints() -> Result<EndpointRegistry> {
    let mut registry = EndpointRegistry::new();
    reports::register(&mut registry)?;
    bank_payments::register(&mut registry)?;
    bank_receipts::register(&mut registry)?;
    Ok(registry)
}
