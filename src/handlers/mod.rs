//! API handlers for the lending engine

pub mod health;
pub mod repayment;
pub mod reputation;
pub mod user;

pub use health::health_check;
pub use repayment::record_repayment;
pub use reputation::{get_reputation, get_reputation_history};
pub use user::{get_eligibility, unblock_user};
