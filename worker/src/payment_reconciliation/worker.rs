use anyhow::Result;
use crates::domain::{
    entities::jobs::JobEntity, repositories::job::JobRepository,
    value_objects::payment_reconciliation::PaymentReconciliationPayload,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

use crate::usecases::payment_reconciliation::{
    PaymentReconciliationUseCase, ReconciliationOutcome,
};

#[derive(Debug, Clone)]
pub struct ReconciliationWorkerConfig {
    pub max_attempts: i32,
    pub poll_interval: Duration,
}

/// Where a job ended up after one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDisposition {
    Done,
    Retry,
    Dead,
}

pub async fn run(
    job_repo: Arc<dyn JobRepository + Send + Sync>,
    usecase: Arc<PaymentReconciliationUseCase>,
    config: ReconciliationWorkerConfig,
) -> Result<()> {
    info!(
        max_attempts = config.max_attempts,
        poll_interval_secs = config.poll_interval.as_secs(),
        "reconciliation: starting worker loop"
    );
    loop {
        match job_repo.lock_next_payment_reconciliation_job().await {
            Ok(Some(job)) => {
                info!(job_id = %job.id, attempts = job.attempts, "reconciliation: processing job");
                process_job(&job_repo, &usecase, &config, &job).await;
            }
            Ok(None) => {
                tokio::time::sleep(config.poll_interval).await;
            }
            Err(e) => {
                error!(error = %e, "reconciliation: error locking next job");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
}

/// Runs one locked job and records its disposition in the queue.
pub async fn process_job(
    job_repo: &Arc<dyn JobRepository + Send + Sync>,
    usecase: &PaymentReconciliationUseCase,
    config: &ReconciliationWorkerConfig,
    job: &JobEntity,
) -> JobDisposition {
    let payload: PaymentReconciliationPayload = match serde_json::from_value(job.payload.clone())
    {
        Ok(payload) => payload,
        Err(err) => {
            error!(job_id = %job.id, error = %err, "reconciliation: unreadable job payload");
            mark_dead(job_repo, job, &format!("unreadable payload: {err}")).await;
            return JobDisposition::Dead;
        }
    };

    match usecase.reconcile(&payload).await {
        Ok(outcome) => {
            log_outcome(job, &outcome);
            if let Err(err) = job_repo.mark_job_done(job.id).await {
                error!(job_id = %job.id, error = %err, "reconciliation: failed to mark job done");
            }
            JobDisposition::Done
        }
        Err(err) if err.is_retryable() => {
            warn!(
                job_id = %job.id,
                attempts = job.attempts + 1,
                max_attempts = config.max_attempts,
                payment_id = ?payload.payment_id,
                error = %err,
                "reconciliation: attempt failed; will retry"
            );
            if let Err(mark_err) = job_repo
                .mark_job_failed(job.id, &err.to_string(), config.max_attempts)
                .await
            {
                error!(
                    job_id = %job.id,
                    error = %mark_err,
                    "reconciliation: failed to mark job as failed"
                );
            }
            if job.attempts + 1 >= config.max_attempts {
                error!(
                    job_id = %job.id,
                    notification_id = ?payload.notification_id,
                    payment_id = ?payload.payment_id,
                    error = %err,
                    "reconciliation: retries exhausted; needs manual reconciliation"
                );
                JobDisposition::Dead
            } else {
                JobDisposition::Retry
            }
        }
        Err(err) => {
            error!(
                job_id = %job.id,
                notification_id = ?payload.notification_id,
                payment_id = ?payload.payment_id,
                error = %err,
                "reconciliation: permanent failure; needs manual reconciliation"
            );
            mark_dead(job_repo, job, &err.to_string()).await;
            JobDisposition::Dead
        }
    }
}

async fn mark_dead(job_repo: &Arc<dyn JobRepository + Send + Sync>, job: &JobEntity, reason: &str) {
    if let Err(err) = job_repo.mark_job_dead(job.id, reason).await {
        error!(job_id = %job.id, error = %err, "reconciliation: failed to mark job dead");
    }
}

fn log_outcome(job: &JobEntity, outcome: &ReconciliationOutcome) {
    match outcome {
        ReconciliationOutcome::Activated {
            user_id,
            payment_id,
        } => info!(job_id = %job.id, %user_id, %payment_id, "reconciliation: job done (activated)"),
        ReconciliationOutcome::Stale {
            user_id,
            payment_id,
        } => info!(job_id = %job.id, %user_id, %payment_id, "reconciliation: job done (stale)"),
        ReconciliationOutcome::NotApproved {
            payment_id,
            status,
            status_detail,
        } => info!(
            job_id = %job.id,
            %payment_id,
            %status,
            status_detail = status_detail.as_deref().unwrap_or("-"),
            "reconciliation: job done (not approved)"
        ),
        ReconciliationOutcome::Ignored { event_type } => {
            info!(job_id = %job.id, %event_type, "reconciliation: job done (ignored)")
        }
    }
}
