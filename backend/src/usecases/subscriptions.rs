use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    repositories::subscriptions::{InsertOutcome, SubscriptionRepository},
    value_objects::subscriptions::{
        ManualActivationModel, StartTrialModel, SubscriptionDto, TrialSubscriptionModel,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::stage::Stage;

const MAX_MANUAL_ACTIVATION_DAYS: i64 = 366;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("user_id is required")]
    MissingUserId,
    #[error("days must be between 1 and {MAX_MANUAL_ACTIVATION_DAYS}")]
    InvalidDays,
    #[error("manual activation is disabled in production")]
    ManualActivationDisabled,
    #[error("subscription not found")]
    SubscriptionNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::MissingUserId | SubscriptionError::InvalidDays => {
                StatusCode::BAD_REQUEST
            }
            SubscriptionError::ManualActivationDisabled => StatusCode::FORBIDDEN,
            SubscriptionError::SubscriptionNotFound => StatusCode::NOT_FOUND,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    Created(SubscriptionDto),
    /// A record already existed and `force_new` was not set; returned unchanged.
    Existing(SubscriptionDto),
}

pub struct SubscriptionUseCase<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    stage: Stage,
}

impl<S> SubscriptionUseCase<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>, stage: Stage) -> Self {
        Self {
            subscription_repo,
            stage,
        }
    }

    pub async fn start_trial(&self, model: StartTrialModel) -> UseCaseResult<TrialOutcome> {
        let user_id = normalize_user_id(&model.user_id)?;
        info!(%user_id, force_new = model.force_new, "subscriptions: starting trial");

        let existing = self
            .subscription_repo
            .find_by_user_id(&user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load subscription");
                SubscriptionError::Internal(err)
            })?;

        if let Some(existing) = existing {
            if !model.force_new {
                info!(
                    %user_id,
                    status = %existing.status,
                    "subscriptions: subscription already exists; trial not created"
                );
                return Ok(TrialOutcome::Existing(SubscriptionDto::from_entity(
                    existing,
                    Utc::now(),
                )));
            }

            warn!(%user_id, "subscriptions: force_new set; removing existing subscription");
            self.subscription_repo
                .delete_by_user_id(&user_id)
                .await
                .map_err(|err| {
                    error!(%user_id, db_error = ?err, "subscriptions: failed to delete subscription");
                    SubscriptionError::Internal(err)
                })?;
        }

        let now = Utc::now();
        let entity = TrialSubscriptionModel {
            user_id: user_id.clone(),
        }
        .to_entity(now);

        // A payment may land between the lookup above and this insert; it wins.
        let outcome = self
            .subscription_repo
            .insert_if_absent(entity)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to create trial");
                SubscriptionError::Internal(err)
            })?;

        match outcome {
            InsertOutcome::Created(record) => {
                info!(
                    %user_id,
                    subscription_id = %record.subscription_id,
                    expires_at = ?record.expires_at,
                    "subscriptions: trial created"
                );
                Ok(TrialOutcome::Created(SubscriptionDto::from_entity(record, now)))
            }
            InsertOutcome::Existing(record) => {
                warn!(
                    %user_id,
                    status = %record.status,
                    "subscriptions: record appeared concurrently; trial not created"
                );
                Ok(TrialOutcome::Existing(SubscriptionDto::from_entity(record, now)))
            }
        }
    }

    /// Grants premium access without a payment. Operator tool; refused in production.
    pub async fn activate_manually(
        &self,
        model: ManualActivationModel,
    ) -> UseCaseResult<SubscriptionDto> {
        if self.stage.is_production() {
            warn!(user_id = %model.user_id, "subscriptions: manual activation refused in production");
            return Err(SubscriptionError::ManualActivationDisabled);
        }

        let user_id = normalize_user_id(&model.user_id)?;
        if model
            .days
            .is_some_and(|days| !(1..=MAX_MANUAL_ACTIVATION_DAYS).contains(&days))
        {
            return Err(SubscriptionError::InvalidDays);
        }

        let now = Utc::now();
        let entity = ManualActivationModel {
            user_id: user_id.clone(),
            days: model.days,
        }
        .to_entity(now);

        let outcome = self
            .subscription_repo
            .upsert_by_user_id(entity)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: manual activation failed");
                SubscriptionError::Internal(err)
            })?;

        let record = outcome.record().clone();
        info!(
            %user_id,
            subscription_id = %record.subscription_id,
            expires_at = ?record.expires_at,
            "subscriptions: subscription activated manually"
        );
        Ok(SubscriptionDto::from_entity(record, now))
    }

    pub async fn get_subscription(&self, user_id: &str) -> UseCaseResult<SubscriptionDto> {
        let user_id = normalize_user_id(user_id)?;

        let record = self
            .subscription_repo
            .find_by_user_id(&user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load subscription");
                SubscriptionError::Internal(err)
            })?
            .ok_or(SubscriptionError::SubscriptionNotFound)?;

        Ok(SubscriptionDto::from_entity(record, Utc::now()))
    }

    pub async fn cancel(&self, user_id: &str) -> UseCaseResult<SubscriptionDto> {
        let user_id = normalize_user_id(user_id)?;
        info!(%user_id, "subscriptions: cancelling subscription");

        let record = self
            .subscription_repo
            .cancel_by_user_id(&user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to cancel subscription");
                SubscriptionError::Internal(err)
            })?
            .ok_or(SubscriptionError::SubscriptionNotFound)?;

        Ok(SubscriptionDto::from_entity(record, Utc::now()))
    }
}

fn normalize_user_id(user_id: &str) -> UseCaseResult<String> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(SubscriptionError::MissingUserId);
    }
    Ok(trimmed.to_string())
}
