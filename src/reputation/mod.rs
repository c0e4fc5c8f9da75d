//! Reputation engine: score ledger, audit trail, and the borrowing gate

pub mod gate;
pub mod ledger;
pub mod model;

pub use gate::BlockingGate;
pub use ledger::{plan_outcome, AppliedOutcome, OutcomePlan, ReputationLedger};
pub use model::{
    clamp_score, NewReputationEvent, Reputation, ReputationEvent, ReputationEventType,
    DEFAULT_SCORE, MAX_SCORE, MIN_SCORE,
};
