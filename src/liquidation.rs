//! Overdue loan sweep
//!
//! Runs on a cron schedule. Loans past due but inside the grace window get a
//! warning; loans past the grace window are defaulted and charged a LATE
//! outcome through the same ledger path a late repayment takes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::loan::LoanStatus;
use crate::repayment::RepaymentClassification;
use crate::reputation::ReputationLedger;
use crate::store::Store;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Outbound notices about overdue loans
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn overdue_warning(&self, user_id: Uuid, loan_id: Uuid, days_overdue: i64);

    async fn loan_defaulted(&self, user_id: Uuid, loan_id: Uuid, days_overdue: i64, blocked: bool);
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn overdue_warning(&self, user_id: Uuid, loan_id: Uuid, days_overdue: i64) {
        tracing::warn!(
            user_id = %user_id,
            loan_id = %loan_id,
            days_overdue,
            "Loan overdue, within grace period"
        );
    }

    async fn loan_defaulted(&self, user_id: Uuid, loan_id: Uuid, days_overdue: i64, blocked: bool) {
        tracing::warn!(
            user_id = %user_id,
            loan_id = %loan_id,
            days_overdue,
            blocked,
            "Loan defaulted after grace period"
        );
    }
}

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub warned: usize,
    pub defaulted: usize,
    pub failed: usize,
}

enum LoanAction {
    Skipped,
    Warned,
    Defaulted,
}

#[derive(Clone)]
pub struct LiquidationSweep {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    grace_days: i64,
}

impl LiquidationSweep {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, grace_days: i64) -> Self {
        Self {
            store,
            notifier,
            grace_days,
        }
    }

    /// Sweep every ACTIVE loan that is past due as of `now`.
    ///
    /// Each loan is handled in its own unit of work. A failure on one loan is
    /// logged and counted, and the sweep moves on.
    pub async fn run_once(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let loan_ids = self.store.overdue_loan_ids(now).await?;
        let mut report = SweepReport {
            examined: loan_ids.len(),
            ..SweepReport::default()
        };

        for loan_id in loan_ids {
            match self.process_loan(loan_id, now).await {
                Ok(LoanAction::Warned) => report.warned += 1,
                Ok(LoanAction::Defaulted) => report.defaulted += 1,
                Ok(LoanAction::Skipped) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(loan_id = %loan_id, error = %e, "Failed to process overdue loan");
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            warned = report.warned,
            defaulted = report.defaulted,
            failed = report.failed,
            "Liquidation sweep finished"
        );

        Ok(report)
    }

    async fn process_loan(&self, loan_id: Uuid, now: DateTime<Utc>) -> EngineResult<LoanAction> {
        let mut uow = self.store.begin().await?;

        let mut loan = uow
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Loan {} not found", loan_id)))?;

        // Repaid or extended since the overdue query ran
        let due_at = match loan.due_at {
            Some(due_at) if loan.status == LoanStatus::Active && due_at < now => due_at,
            _ => return Ok(LoanAction::Skipped),
        };

        let days_overdue = (now - due_at).num_milliseconds() / MILLIS_PER_DAY;

        if days_overdue <= self.grace_days {
            drop(uow);
            self.notifier
                .overdue_warning(loan.user_id, loan_id, days_overdue)
                .await;
            return Ok(LoanAction::Warned);
        }

        let late_days = i32::try_from(days_overdue).unwrap_or(i32::MAX);
        loan.status = LoanStatus::Defaulted;
        loan.late_days = late_days;
        uow.update_loan(&loan).await?;

        let applied = ReputationLedger::apply_outcome_in(
            uow.as_mut(),
            loan.user_id,
            RepaymentClassification::Late,
            late_days,
            Some(loan_id),
        )
        .await?;
        uow.commit().await?;

        self.notifier
            .loan_defaulted(loan.user_id, loan_id, days_overdue, applied.blocked)
            .await;

        Ok(LoanAction::Defaulted)
    }
}

/// Start the sweep on `cron` (six-field, seconds first).
///
/// The returned scheduler must be kept alive for the job to keep firing.
pub async fn spawn_liquidation_scheduler(
    sweep: LiquidationSweep,
    cron: &str,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_job_id, _scheduler| {
        let sweep = sweep.clone();
        Box::pin(async move {
            if let Err(e) = sweep.run_once(Utc::now()).await {
                tracing::error!(error = %e, "Liquidation sweep failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(cron = %cron, "Liquidation sweep scheduled");
    Ok(scheduler)
}
