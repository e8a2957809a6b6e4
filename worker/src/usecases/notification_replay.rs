use std::sync::Arc;

use crates::domain::{
    repositories::{job::JobRepository, payment_notifications::PaymentNotificationRepository},
    value_objects::{
        payment_reconciliation::PaymentReconciliationPayload,
        payment_webhook::{PaymentEventRef, PaymentWebhookQuery},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("notification {0} not found")]
    NotFound(Uuid),
    #[error("replay failed: {0}")]
    Internal(#[source] anyhow::Error),
}

/// Re-enqueues a recorded delivery, e.g. after an enqueue outage or a dead-lettered job.
pub struct NotificationReplayUseCase {
    notification_repository: Arc<dyn PaymentNotificationRepository + Send + Sync>,
    job_repository: Arc<dyn JobRepository + Send + Sync>,
}

impl NotificationReplayUseCase {
    pub fn new(
        notification_repository: Arc<dyn PaymentNotificationRepository + Send + Sync>,
        job_repository: Arc<dyn JobRepository + Send + Sync>,
    ) -> Self {
        Self {
            notification_repository,
            job_repository,
        }
    }

    pub async fn replay(&self, notification_id: Uuid) -> Result<Uuid, ReplayError> {
        let notification = self
            .notification_repository
            .find_by_id(notification_id)
            .await
            .map_err(|err| {
                error!(%notification_id, db_error = ?err, "replay: failed to load notification");
                ReplayError::Internal(err)
            })?
            .ok_or(ReplayError::NotFound(notification_id))?;

        // Query-string-only deliveries leave the reference out of the body.
        let payment_id = notification.payment_id.clone().or_else(|| {
            PaymentEventRef::extract(&notification.raw_payload, &PaymentWebhookQuery::default())
                .payment_id
        });
        if payment_id.is_none() {
            warn!(
                %notification_id,
                event_type = %notification.event_type,
                "replay: notification carries no payment reference"
            );
        }

        let payload = PaymentReconciliationPayload {
            notification_id: Some(notification.id),
            event_type: notification.event_type,
            payment_id,
        };

        let job_id = self
            .job_repository
            .enqueue_payment_reconciliation_job(payload)
            .await
            .map_err(|err| {
                error!(%notification_id, db_error = ?err, "replay: failed to enqueue job");
                ReplayError::Internal(err)
            })?;

        info!(%notification_id, %job_id, "replay: reconciliation job enqueued");
        Ok(job_id)
    }
}
