use chrono::{DateTime, Utc};

use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

/// Authoritative payment state as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetails {
    pub payment_id: String,
    pub status: PaymentStatus,
    /// Provider's reason code, e.g. `accredited` or `cc_rejected_insufficient_amount`.
    pub status_detail: Option<String>,
    pub external_reference: Option<String>,
    pub transaction_amount: Option<f64>,
    pub currency_id: Option<String>,
    pub date_approved: Option<DateTime<Utc>>,
    pub date_last_updated: Option<DateTime<Utc>>,
    pub date_created: Option<DateTime<Utc>>,
}

impl PaymentDetails {
    /// Timestamp used to order competing writes for the same user.
    pub fn effective_at(&self) -> Option<DateTime<Utc>> {
        self.date_approved
            .or(self.date_last_updated)
            .or(self.date_created)
    }

    pub fn attributed_user_id(&self) -> Option<&str> {
        self.external_reference
            .as_deref()
            .map(str::trim)
            .filter(|user_id| !user_id.is_empty())
    }
}
