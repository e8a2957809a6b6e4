use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::subscriptions::{SubscriptionRepository, UpsertOutcome},
    value_objects::subscriptions::PaymentActivationModel,
};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ActivatePaymentCommand {
    pub user_id: String,
    pub payment_id: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    Activated(SubscriptionEntity),
    /// The stored record already reflects this payment or a newer one.
    Stale(SubscriptionEntity),
    /// No user to credit; nothing was written.
    Unattributed,
}

pub struct SubscriptionActivationUseCase {
    subscription_repository: Arc<dyn SubscriptionRepository + Send + Sync>,
}

impl SubscriptionActivationUseCase {
    pub fn new(subscription_repository: Arc<dyn SubscriptionRepository + Send + Sync>) -> Self {
        Self {
            subscription_repository,
        }
    }

    pub async fn activate(&self, command: ActivatePaymentCommand) -> Result<ActivationOutcome> {
        let user_id = command.user_id.trim();
        if user_id.is_empty() {
            error!(
                payment_id = %command.payment_id,
                amount = ?command.amount,
                currency = ?command.currency,
                "reconciliation: approved payment has no user reference; needs manual reconciliation"
            );
            return Ok(ActivationOutcome::Unattributed);
        }

        let entity = PaymentActivationModel {
            user_id: user_id.to_string(),
            payment_id: command.payment_id.clone(),
            approved_at: command.approved_at,
        }
        .to_entity(Utc::now());

        let outcome = self
            .subscription_repository
            .upsert_by_user_id(entity)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    payment_id = %command.payment_id,
                    db_error = ?err,
                    "reconciliation: subscription upsert failed"
                );
                err
            })?;

        match outcome {
            UpsertOutcome::Written(record) => {
                info!(
                    %user_id,
                    payment_id = %command.payment_id,
                    subscription_id = %record.subscription_id,
                    expires_at = ?record.expires_at,
                    amount = ?command.amount,
                    currency = ?command.currency,
                    "reconciliation: subscription activated"
                );
                Ok(ActivationOutcome::Activated(record))
            }
            UpsertOutcome::Stale(current) => {
                warn!(
                    %user_id,
                    payment_id = %command.payment_id,
                    approved_at = %command.approved_at,
                    current_payment_id = ?current.last_payment_id,
                    current_payment_at = ?current.last_payment_at,
                    "reconciliation: payment is not newer than stored state; skipped"
                );
                Ok(ActivationOutcome::Stale(current))
            }
        }
    }
}
