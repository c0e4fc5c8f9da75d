//! LendScore Server Library
//!
//! Repayment classification, the partial-payment extension policy, the
//! reputation ledger with its blocking gate, and the overdue-loan sweep,
//! served over a small JSON API.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod liquidation;
pub mod loan;
pub mod middleware;
pub mod models;
pub mod repayment;
pub mod reputation;
pub mod routes;
pub mod state;
pub mod store;
