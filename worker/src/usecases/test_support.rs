use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use crates::domain::{
    entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity},
    repositories::subscriptions::{InsertOutcome, SubscriptionRepository, UpsertOutcome},
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};
use uuid::Uuid;

/// Keyed store with the same write rules as the Postgres upsert.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    records: Mutex<HashMap<String, SubscriptionEntity>>,
    writes: AtomicUsize,
}

impl InMemorySubscriptionStore {
    pub fn get(&self, user_id: &str) -> Option<SubscriptionEntity> {
        self.records.lock().ok()?.get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionStore {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionEntity>> {
        Ok(self.get(user_id))
    }

    async fn upsert_by_user_id(&self, entity: UpsertSubscriptionEntity) -> Result<UpsertOutcome> {
        let mut records = self.records.lock().map_err(|_| anyhow!("store poisoned"))?;

        let current = records.get(&entity.user_id).cloned();
        let mut last_payment_id = entity.last_payment_id.clone();
        let mut last_payment_at = entity.last_payment_at;

        if let Some(current) = &current {
            match (current.last_payment_at, entity.last_payment_at) {
                (Some(stored), Some(incoming)) if stored >= incoming => {
                    return Ok(UpsertOutcome::Stale(current.clone()));
                }
                (_, None) => {
                    last_payment_id = current.last_payment_id.clone();
                    last_payment_at = current.last_payment_at;
                }
                _ => {}
            }
        }

        let (id, created_at) = current
            .map(|current| (current.id, current.created_at))
            .unwrap_or_else(|| (Uuid::new_v4(), entity.updated_at));

        let record = SubscriptionEntity {
            id,
            user_id: entity.user_id.clone(),
            subscription_id: entity.subscription_id,
            status: entity.status,
            is_active: entity.is_active,
            plan_type: entity.plan_type,
            started_at: entity.started_at,
            expires_at: entity.expires_at,
            last_payment_id,
            last_payment_at,
            created_at,
            updated_at: entity.updated_at,
        };
        records.insert(entity.user_id, record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(UpsertOutcome::Written(record))
    }

    async fn insert_if_absent(&self, entity: UpsertSubscriptionEntity) -> Result<InsertOutcome> {
        if let Some(current) = self.get(&entity.user_id) {
            return Ok(InsertOutcome::Existing(current));
        }
        match self.upsert_by_user_id(entity).await? {
            UpsertOutcome::Written(record) => Ok(InsertOutcome::Created(record)),
            UpsertOutcome::Stale(record) => Ok(InsertOutcome::Existing(record)),
        }
    }

    async fn delete_by_user_id(&self, user_id: &str) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("store poisoned"))?
            .remove(user_id);
        Ok(())
    }

    async fn cancel_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionEntity>> {
        let mut records = self.records.lock().map_err(|_| anyhow!("store poisoned"))?;
        Ok(records.get_mut(user_id).map(|record| {
            record.status = SubscriptionStatus::Cancelled.to_string();
            record.is_active = false;
            record.updated_at = Utc::now();
            record.clone()
        }))
    }
}
