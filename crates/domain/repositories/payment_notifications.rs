use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_notifications::{
    InsertPaymentNotificationEntity, PaymentNotificationEntity,
};

/// Append-only audit log of provider deliveries.
#[automock]
#[async_trait]
pub trait PaymentNotificationRepository {
    async fn append(&self, entity: InsertPaymentNotificationEntity) -> Result<Uuid>;

    async fn find_by_id(&self, notification_id: Uuid) -> Result<Option<PaymentNotificationEntity>>;
}
