use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::jobs::JobEntity,
    value_objects::payment_reconciliation::PaymentReconciliationPayload,
};

#[automock]
#[async_trait]
pub trait JobRepository {
    async fn enqueue_payment_reconciliation_job(
        &self,
        payload: PaymentReconciliationPayload,
    ) -> Result<Uuid>;

    async fn lock_next_payment_reconciliation_job(&self) -> Result<Option<JobEntity>>;

    async fn mark_job_done(&self, job_id: Uuid) -> Result<()>;

    async fn mark_job_failed(&self, job_id: Uuid, err: &str, max_attempts: i32) -> Result<()>;

    /// Parks the job for manual reconciliation without further retries.
    async fn mark_job_dead(&self, job_id: Uuid, err: &str) -> Result<()>;
}
