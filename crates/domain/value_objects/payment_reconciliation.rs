use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job payload handed from the webhook receiver to the reconciliation worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReconciliationPayload {
    pub notification_id: Option<Uuid>,
    pub event_type: String,
    pub payment_id: Option<String>,
}
