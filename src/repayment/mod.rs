//! Repayment intake: classification, the partial-payment extension, and the
//! transactional flow tying both to the reputation ledger

pub mod classifier;
pub mod extension;
pub mod service;

pub use classifier::{classify, days_late, RepaymentClassification, RepaymentOutcome};
pub use extension::{apply_extension, decide, ExtensionDecision};
pub use service::{RepaymentReceipt, RepaymentService};
