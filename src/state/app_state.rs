//! Application state shared across handlers

use std::sync::Arc;

use crate::repayment::RepaymentService;
use crate::reputation::{BlockingGate, ReputationLedger};
use crate::store::Store;

use axum::extract::FromRef;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub repayment_service: Arc<RepaymentService>,
    pub reputation_ledger: Arc<ReputationLedger>,
    pub blocking_gate: Arc<BlockingGate>,
}

impl AppState {
    /// Wire every service over the same store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            repayment_service: Arc::new(RepaymentService::new(store.clone())),
            reputation_ledger: Arc::new(ReputationLedger::new(store.clone())),
            blocking_gate: Arc::new(BlockingGate::new(store.clone())),
            store,
        }
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for Arc<RepaymentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.repayment_service.clone()
    }
}

impl FromRef<AppState> for Arc<ReputationLedger> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reputation_ledger.clone()
    }
}

impl FromRef<AppState> for Arc<BlockingGate> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.blocking_gate.clone()
    }
}
