use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*, sql_types::Bool};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::jobs},
};
use domain::{
    entities::jobs::{InsertJobEntity, JobEntity},
    repositories::job::JobRepository,
    value_objects::{
        enums::job_statuses::{JobStatus, JobType},
        payment_reconciliation::PaymentReconciliationPayload,
    },
};

pub const DEFAULT_LOCK_LEASE_SECS: i64 = 300;

pub struct JobPostgres {
    db_pool: Arc<PgPoolSquad>,
    lock_lease: chrono::Duration,
}

impl JobPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self {
            db_pool,
            lock_lease: chrono::Duration::seconds(DEFAULT_LOCK_LEASE_SECS),
        }
    }

    /// How long a `running` job may stay locked before another worker reclaims it.
    pub fn with_lock_lease(mut self, lock_lease: chrono::Duration) -> Self {
        self.lock_lease = lock_lease;
        self
    }
}

type ClaimCondition = Box<dyn BoxableExpression<jobs::table, Pg, SqlType = Bool>>;

/// Due queued jobs, plus running jobs whose lock is older than `lease`.
/// The second arm recovers jobs left behind by a worker that died mid-run.
pub fn claimable_jobs(now: DateTime<Utc>, lease: chrono::Duration) -> ClaimCondition {
    Box::new(
        jobs::status
            .eq(JobStatus::Queued.as_str())
            .and(jobs::run_at.le(now))
            .or(jobs::status
                .eq(JobStatus::Running.as_str())
                .and(jobs::locked_at.assume_not_null().lt(now - lease))),
    )
}

/// Delay before the next attempt: 5s, 25s, 125s...
pub fn retry_backoff_seconds(attempts: i32) -> i64 {
    let exponent = attempts.saturating_sub(1).clamp(0, 10) as u32;
    5 * 5_i64.pow(exponent)
}

#[async_trait]
impl JobRepository for JobPostgres {
    async fn enqueue_payment_reconciliation_job(
        &self,
        payload: PaymentReconciliationPayload,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payload_json = serde_json::to_value(payload)?;

        let insert_entity = InsertJobEntity {
            type_: JobType::PaymentReconciliation.to_string(),
            payload: payload_json,
            run_at: Utc::now(),
            attempts: 0,
            locked_at: None,
            locked_by: None,
            status: JobStatus::Queued.to_string(),
            error: None,
            created_at: Utc::now(),
        };

        let result = diesel::insert_into(jobs::table)
            .values(&insert_entity)
            .returning(jobs::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn lock_next_payment_reconciliation_job(&self) -> Result<Option<JobEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let worker_id = Uuid::new_v4().to_string();
        let current_time = Utc::now();

        let job = conn.transaction::<Option<JobEntity>, diesel::result::Error, _>(|conn| {
            let candidate: Option<JobEntity> = jobs::table
                .select(JobEntity::as_select())
                .filter(jobs::type_.eq(JobType::PaymentReconciliation.as_str()))
                .filter(claimable_jobs(current_time, self.lock_lease))
                .order(jobs::run_at.asc())
                .for_update()
                .skip_locked()
                .first::<JobEntity>(conn)
                .optional()?;

            match candidate {
                Some(job) => {
                    if job.status == JobStatus::Running.as_str() {
                        warn!(
                            job_id = %job.id,
                            previous_owner = ?job.locked_by,
                            locked_at = ?job.locked_at,
                            "jobs: reclaiming job with expired lock"
                        );
                    }
                    let locked = diesel::update(jobs::table.find(job.id))
                        .set((
                            jobs::status.eq(JobStatus::Running.as_str()),
                            jobs::locked_at.eq(Some(current_time)),
                            jobs::locked_by.eq(Some(worker_id)),
                        ))
                        .returning(JobEntity::as_select())
                        .get_result::<JobEntity>(conn)?;
                    Ok(Some(locked))
                }
                None => Ok(None),
            }
        })?;

        Ok(job)
    }

    async fn mark_job_done(&self, job_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(jobs::table.find(job_id))
            .set((
                jobs::status.eq(JobStatus::Done.as_str()),
                jobs::locked_at.eq::<Option<DateTime<Utc>>>(None),
                jobs::locked_by.eq::<Option<String>>(None),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_job_failed(&self, job_id: Uuid, err: &str, max_attempts: i32) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let current_time = Utc::now();

        let job = jobs::table
            .find(job_id)
            .select(JobEntity::as_select())
            .first::<JobEntity>(&mut conn)?;

        let new_attempts = job.attempts + 1;
        let (new_status, next_run_at) = if new_attempts < max_attempts {
            let backoff_sec = retry_backoff_seconds(new_attempts);
            (
                JobStatus::Queued,
                current_time + chrono::Duration::seconds(backoff_sec),
            )
        } else {
            (JobStatus::Dead, current_time)
        };

        diesel::update(jobs::table.find(job_id))
            .set((
                jobs::status.eq(new_status.as_str()),
                jobs::attempts.eq(new_attempts),
                jobs::error.eq(Some(err)),
                jobs::run_at.eq(next_run_at),
                jobs::locked_at.eq::<Option<DateTime<Utc>>>(None),
                jobs::locked_by.eq::<Option<String>>(None),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_job_dead(&self, job_id: Uuid, err: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(jobs::table.find(job_id))
            .set((
                jobs::status.eq(JobStatus::Dead.as_str()),
                jobs::attempts.eq(jobs::attempts + 1),
                jobs::error.eq(Some(err)),
                jobs::locked_at.eq::<Option<DateTime<Utc>>>(None),
                jobs::locked_by.eq::<Option<String>>(None),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
