use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity};

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Written(SubscriptionEntity),
    /// The stored record carries a newer (or the same) payment; nothing was written.
    Stale(SubscriptionEntity),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(SubscriptionEntity),
    /// A record for the user already existed; returned as stored.
    Existing(SubscriptionEntity),
}

impl UpsertOutcome {
    pub fn record(&self) -> &SubscriptionEntity {
        match self {
            UpsertOutcome::Written(record) | UpsertOutcome::Stale(record) => record,
        }
    }
}

/// Keyed store of subscription records. At most one record exists per `user_id`.
#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionEntity>>;

    /// Atomic insert-or-update on `user_id`.
    ///
    /// A payment-backed write (`last_payment_at` set) only replaces a stored
    /// record whose payment is absent or strictly older. A write without a
    /// payment always applies but keeps the stored `last_payment_*` values.
    async fn upsert_by_user_id(&self, entity: UpsertSubscriptionEntity) -> Result<UpsertOutcome>;

    /// Atomic insert that never touches an existing record for the user.
    async fn insert_if_absent(&self, entity: UpsertSubscriptionEntity) -> Result<InsertOutcome>;

    async fn delete_by_user_id(&self, user_id: &str) -> Result<()>;

    async fn cancel_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionEntity>>;
}
