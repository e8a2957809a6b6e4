use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use crates::{
    domain::{
        entities::payment_notifications::InsertPaymentNotificationEntity,
        repositories::{job::JobRepository, payment_notifications::PaymentNotificationRepository},
        value_objects::{
            enums::signature_statuses::SignatureStatus,
            payment_reconciliation::PaymentReconciliationPayload,
            payment_webhook::{PAYMENT_PROVIDER, PaymentEventRef, PaymentWebhookQuery},
        },
    },
    payments::webhook_signature::{DEFAULT_SIGNATURE_TOLERANCE_SECS, verify_webhook_signature},
};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything the receiver keeps from one HTTP delivery.
#[derive(Debug, Clone, Default)]
pub struct InboundDelivery {
    pub body: Vec<u8>,
    pub query: PaymentWebhookQuery,
    pub signature_header: Option<String>,
    pub request_id: Option<String>,
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Enqueued {
        notification_id: Option<Uuid>,
        job_id: Uuid,
    },
    /// Recorded but not processed because the signature did not verify.
    SignatureRejected { notification_id: Option<Uuid> },
    /// Recorded (when the audit log was reachable) but the hand-off failed.
    EnqueueFailed { notification_id: Option<Uuid> },
}

pub struct PaymentWebhookUseCase {
    notification_repository: Arc<dyn PaymentNotificationRepository + Send + Sync>,
    job_repository: Arc<dyn JobRepository + Send + Sync>,
    webhook_secret: Option<String>,
    signature_tolerance: Duration,
}

impl PaymentWebhookUseCase {
    pub fn new(
        notification_repository: Arc<dyn PaymentNotificationRepository + Send + Sync>,
        job_repository: Arc<dyn JobRepository + Send + Sync>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            notification_repository,
            job_repository,
            webhook_secret,
            signature_tolerance: Duration::seconds(DEFAULT_SIGNATURE_TOLERANCE_SECS),
        }
    }

    /// Maximum distance between a signature's `ts` and the time of receipt.
    pub fn with_signature_tolerance(mut self, signature_tolerance: Duration) -> Self {
        self.signature_tolerance = signature_tolerance;
        self
    }

    /// Records the delivery and hands it to the reconciliation queue.
    ///
    /// Never fails: the provider cannot act on an error response other than
    /// retrying the same event, so every failure is logged and absorbed here.
    pub async fn receive(&self, delivery: InboundDelivery) -> DeliveryOutcome {
        let received_at = Utc::now();

        let raw_payload = match serde_json::from_slice::<Value>(&delivery.body) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    error = %err,
                    body_len = delivery.body.len(),
                    "payment_webhook: body is not valid JSON; storing raw text"
                );
                Value::String(String::from_utf8_lossy(&delivery.body).into_owned())
            }
        };

        let event = PaymentEventRef::extract(&raw_payload, &delivery.query);
        let event_type = event.event_type_or_unknown();
        let signature_status = self.check_signature(&delivery, &event, received_at);

        info!(
            %event_type,
            payment_id = ?event.payment_id,
            %signature_status,
            source_address = ?delivery.source_address,
            "payment_webhook: delivery received"
        );

        let notification_id = Uuid::new_v4();
        let notification = InsertPaymentNotificationEntity {
            id: notification_id,
            provider: PAYMENT_PROVIDER.to_string(),
            event_type: event_type.clone(),
            payment_id: event.payment_id.clone(),
            raw_payload,
            received_at,
            source_address: delivery.source_address.clone(),
            client_agent: delivery.client_agent.clone(),
            signature_status: signature_status.to_string(),
        };

        let notification_id = match self.notification_repository.append(notification).await {
            Ok(id) => Some(id),
            Err(err) => {
                error!(
                    %notification_id,
                    %event_type,
                    payment_id = ?event.payment_id,
                    db_error = ?err,
                    "payment_webhook: failed to append notification record"
                );
                None
            }
        };

        if !signature_status.allows_processing() {
            warn!(
                notification_id = ?notification_id,
                %event_type,
                payment_id = ?event.payment_id,
                "payment_webhook: signature rejected; delivery recorded but not processed"
            );
            return DeliveryOutcome::SignatureRejected { notification_id };
        }

        let payload = PaymentReconciliationPayload {
            notification_id,
            event_type: event_type.clone(),
            payment_id: event.payment_id.clone(),
        };

        match self
            .job_repository
            .enqueue_payment_reconciliation_job(payload)
            .await
        {
            Ok(job_id) => {
                info!(
                    %job_id,
                    notification_id = ?notification_id,
                    %event_type,
                    "payment_webhook: reconciliation job enqueued"
                );
                DeliveryOutcome::Enqueued {
                    notification_id,
                    job_id,
                }
            }
            Err(err) => {
                error!(
                    notification_id = ?notification_id,
                    %event_type,
                    payment_id = ?event.payment_id,
                    db_error = ?err,
                    "payment_webhook: failed to enqueue reconciliation job"
                );
                DeliveryOutcome::EnqueueFailed { notification_id }
            }
        }
    }

    fn check_signature(
        &self,
        delivery: &InboundDelivery,
        event: &PaymentEventRef,
        received_at: DateTime<Utc>,
    ) -> SignatureStatus {
        let Some(secret) = self.webhook_secret.as_deref() else {
            return SignatureStatus::Unsigned;
        };

        let Some(header) = delivery.signature_header.as_deref() else {
            warn!("payment_webhook: signature header missing while a secret is configured");
            return SignatureStatus::Invalid;
        };

        match verify_webhook_signature(
            secret,
            header,
            delivery.request_id.as_deref(),
            event.payment_id.as_deref(),
            received_at,
            self.signature_tolerance,
        ) {
            Ok(()) => SignatureStatus::Verified,
            Err(err) => {
                warn!(error = %err, "payment_webhook: signature verification failed");
                SignatureStatus::Invalid
            }
        }
    }
}
