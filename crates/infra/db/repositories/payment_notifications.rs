use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_notifications},
};
use domain::{
    entities::payment_notifications::{InsertPaymentNotificationEntity, PaymentNotificationEntity},
    repositories::payment_notifications::PaymentNotificationRepository,
};

pub struct PaymentNotificationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentNotificationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentNotificationRepository for PaymentNotificationPostgres {
    async fn append(&self, entity: InsertPaymentNotificationEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(payment_notifications::table)
            .values(&entity)
            .returning(payment_notifications::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id(&self, notification_id: Uuid) -> Result<Option<PaymentNotificationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = payment_notifications::table
            .find(notification_id)
            .select(PaymentNotificationEntity::as_select())
            .first::<PaymentNotificationEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }
}
