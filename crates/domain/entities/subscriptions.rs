use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::subscriptions;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: String,
    pub subscription_id: String,
    pub status: String,
    pub is_active: bool,
    pub plan_type: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_payment_id: Option<String>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full desired state for a user's record. Payment-backed writes use it for both
/// the insert and the conflict-update branch, so `None` fields are written as NULL.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = subscriptions)]
#[diesel(treat_none_as_null = true)]
pub struct UpsertSubscriptionEntity {
    pub user_id: String,
    pub subscription_id: String,
    pub status: String,
    pub is_active: bool,
    pub plan_type: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_payment_id: Option<String>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Conflict-update columns for writes that carry no payment (trials, manual
/// grants). Leaves the stored `last_payment_*` columns untouched.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = subscriptions)]
#[diesel(treat_none_as_null = true)]
pub struct SubscriptionStateChangeset {
    pub subscription_id: String,
    pub status: String,
    pub is_active: bool,
    pub plan_type: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UpsertSubscriptionEntity> for SubscriptionStateChangeset {
    fn from(entity: &UpsertSubscriptionEntity) -> Self {
        Self {
            subscription_id: entity.subscription_id.clone(),
            status: entity.status.clone(),
            is_active: entity.is_active,
            plan_type: entity.plan_type.clone(),
            started_at: entity.started_at,
            expires_at: entity.expires_at,
            updated_at: entity.updated_at,
        }
    }
}
