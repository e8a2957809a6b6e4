use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity},
    value_objects::enums::{plan_types::PlanType, subscription_statuses::SubscriptionStatus},
};

pub const PAYMENT_ACTIVATION_DAYS: i64 = 30;
pub const TRIAL_DAYS: i64 = 7;
pub const MANUAL_ACTIVATION_DEFAULT_DAYS: i64 = 30;

/// `is_active` holds only for active/trial records whose window is still open.
pub fn derive_is_active(
    status: SubscriptionStatus,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    status.grants_access() && expires_at.is_none_or(|expires_at| expires_at > now)
}

pub fn payment_subscription_id(payment_id: &str) -> String {
    format!("payment_{payment_id}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentActivationModel {
    pub user_id: String,
    pub payment_id: String,
    pub approved_at: DateTime<Utc>,
}

impl PaymentActivationModel {
    /// Every time field derives from `approved_at`, so replaying a payment yields the same row.
    pub fn to_entity(&self, now: DateTime<Utc>) -> UpsertSubscriptionEntity {
        let status = SubscriptionStatus::Active;
        let expires_at = Some(self.approved_at + Duration::days(PAYMENT_ACTIVATION_DAYS));

        UpsertSubscriptionEntity {
            user_id: self.user_id.clone(),
            subscription_id: payment_subscription_id(&self.payment_id),
            status: status.to_string(),
            is_active: derive_is_active(status, expires_at, now),
            plan_type: PlanType::Premium.to_string(),
            started_at: self.approved_at,
            expires_at,
            last_payment_id: Some(self.payment_id.clone()),
            last_payment_at: Some(self.approved_at),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialSubscriptionModel {
    pub user_id: String,
}

impl TrialSubscriptionModel {
    pub fn to_entity(&self, now: DateTime<Utc>) -> UpsertSubscriptionEntity {
        let status = SubscriptionStatus::Trial;
        let expires_at = Some(now + Duration::days(TRIAL_DAYS));

        UpsertSubscriptionEntity {
            user_id: self.user_id.clone(),
            subscription_id: format!("trial_{}", Uuid::new_v4()),
            status: status.to_string(),
            is_active: derive_is_active(status, expires_at, now),
            plan_type: PlanType::Trial.to_string(),
            started_at: now,
            expires_at,
            last_payment_id: None,
            last_payment_at: None,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManualActivationModel {
    pub user_id: String,
    pub days: Option<i64>,
}

impl ManualActivationModel {
    pub fn to_entity(&self, now: DateTime<Utc>) -> UpsertSubscriptionEntity {
        let status = SubscriptionStatus::Active;
        let days = self.days.unwrap_or(MANUAL_ACTIVATION_DEFAULT_DAYS);
        let expires_at = Some(now + Duration::days(days));

        UpsertSubscriptionEntity {
            user_id: self.user_id.clone(),
            subscription_id: format!("manual_{}", Uuid::new_v4()),
            status: status.to_string(),
            is_active: derive_is_active(status, expires_at, now),
            plan_type: PlanType::Premium.to_string(),
            started_at: now,
            expires_at,
            last_payment_id: None,
            last_payment_at: None,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartTrialModel {
    pub user_id: String,
    #[serde(default)]
    pub force_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionDto {
    pub user_id: String,
    pub subscription_id: String,
    pub status: SubscriptionStatus,
    pub is_active: bool,
    pub plan_type: PlanType,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionDto {
    /// The stored flag is only as fresh as the last write, so it is recomputed for reads.
    pub fn from_entity(entity: SubscriptionEntity, now: DateTime<Utc>) -> Self {
        let status = SubscriptionStatus::from_str(&entity.status);
        Self {
            is_active: derive_is_active(status, entity.expires_at, now),
            user_id: entity.user_id,
            subscription_id: entity.subscription_id,
            status,
            plan_type: PlanType::from_str(&entity.plan_type),
            started_at: entity.started_at,
            expires_at: entity.expires_at,
            updated_at: entity.updated_at,
        }
    }
}
