use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update, upsert::excluded};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};
use domain::{
    entities::subscriptions::{
        SubscriptionEntity, SubscriptionStateChangeset, UpsertSubscriptionEntity,
    },
    repositories::subscriptions::{InsertOutcome, SubscriptionRepository, UpsertOutcome},
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

/// Payment-backed write. The conflict branch only fires when the stored payment
/// is absent or strictly older than the incoming one.
macro_rules! payment_upsert {
    ($entity:expr) => {
        diesel::query_dsl::methods::FilterDsl::filter(
            insert_into(subscriptions::table)
                .values($entity)
                .on_conflict(subscriptions::user_id)
                .do_update()
                .set($entity),
            subscriptions::last_payment_at
                .is_null()
                .or(subscriptions::last_payment_at.lt(excluded(subscriptions::last_payment_at))),
        )
        .returning(SubscriptionEntity::as_select())
    };
}

/// Write without a payment: always applies, stored payment columns are kept.
macro_rules! state_upsert {
    ($entity:expr, $state:expr) => {
        insert_into(subscriptions::table)
            .values($entity)
            .on_conflict(subscriptions::user_id)
            .do_update()
            .set($state)
            .returning(SubscriptionEntity::as_select())
    };
}

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert_by_user_id(&self, entity: UpsertSubscriptionEntity) -> Result<UpsertOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Single statement so concurrent deliveries for one user serialize on the row lock.
        let written = if entity.last_payment_at.is_some() {
            payment_upsert!(&entity)
                .get_result::<SubscriptionEntity>(&mut conn)
                .optional()?
        } else {
            let state = SubscriptionStateChangeset::from(&entity);
            Some(state_upsert!(&entity, &state).get_result::<SubscriptionEntity>(&mut conn)?)
        };

        if let Some(record) = written {
            return Ok(UpsertOutcome::Written(record));
        }

        let current = subscriptions::table
            .filter(subscriptions::user_id.eq(&entity.user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)?;

        Ok(UpsertOutcome::Stale(current))
    }

    async fn insert_if_absent(&self, entity: UpsertSubscriptionEntity) -> Result<InsertOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(subscriptions::table)
            .values(&entity)
            .on_conflict(subscriptions::user_id)
            .do_nothing()
            .returning(SubscriptionEntity::as_select())
            .get_result::<SubscriptionEntity>(&mut conn)
            .optional()?;

        if let Some(record) = inserted {
            return Ok(InsertOutcome::Created(record));
        }

        let current = subscriptions::table
            .filter(subscriptions::user_id.eq(&entity.user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)?;

        Ok(InsertOutcome::Existing(current))
    }

    async fn delete_by_user_id(&self, user_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(subscriptions::table)
            .filter(subscriptions::user_id.eq(user_id))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn cancel_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(subscriptions::table)
            .filter(subscriptions::user_id.eq(user_id))
            .set((
                subscriptions::status.eq(SubscriptionStatus::Cancelled.to_string()),
                subscriptions::is_active.eq(false),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .returning(SubscriptionEntity::as_select())
            .get_result::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }
}
