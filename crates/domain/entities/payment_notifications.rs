use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payment_notifications;

/// One row per inbound provider delivery. Rows are never updated.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_notifications)]
pub struct PaymentNotificationEntity {
    pub id: Uuid,
    pub provider: String,
    pub event_type: String,
    /// Payment reference as resolved at receipt, from the body or the query string.
    pub payment_id: Option<String>,
    pub raw_payload: Value,
    pub received_at: DateTime<Utc>,
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
    pub signature_status: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_notifications)]
pub struct InsertPaymentNotificationEntity {
    pub id: Uuid,
    pub provider: String,
    pub event_type: String,
    pub payment_id: Option<String>,
    pub raw_payload: Value,
    pub received_at: DateTime<Utc>,
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
    pub signature_status: String,
}
