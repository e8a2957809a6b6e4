use crates::domain::{
    repositories::payment_provider::PaymentProviderError,
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payment_reconciliation::PaymentReconciliationPayload,
    },
};
use thiserror::Error;
use tracing::{info, warn};

use super::{
    payment_status_resolver::{PaymentStatusResolver, Resolution, ResolveError},
    subscription_activation::{
        ActivatePaymentCommand, ActivationOutcome, SubscriptionActivationUseCase,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    Activated { user_id: String, payment_id: String },
    Stale { user_id: String, payment_id: String },
    NotApproved {
        payment_id: String,
        status: PaymentStatus,
        status_detail: Option<String>,
    },
    Ignored { event_type: String },
}

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("payment event carries no payment id")]
    MissingPaymentId,
    #[error("approved payment {payment_id} has no user reference")]
    Unattributed { payment_id: String },
    #[error("approved payment {payment_id} has no usable timestamp")]
    MissingApprovalDate { payment_id: String },
    #[error(transparent)]
    Provider(#[from] PaymentProviderError),
    #[error("subscription store failure: {0}")]
    Store(#[source] anyhow::Error),
}

impl ReconciliationError {
    /// Retryable failures go back to the queue with backoff; the rest are dead-lettered.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconciliationError::Provider(err) => err.is_retryable(),
            ReconciliationError::Store(_) => true,
            ReconciliationError::MissingPaymentId
            | ReconciliationError::Unattributed { .. }
            | ReconciliationError::MissingApprovalDate { .. } => false,
        }
    }
}

impl From<ResolveError> for ReconciliationError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MissingPaymentId => ReconciliationError::MissingPaymentId,
            ResolveError::Provider(err) => ReconciliationError::Provider(err),
        }
    }
}

pub struct PaymentReconciliationUseCase {
    resolver: PaymentStatusResolver,
    activation: SubscriptionActivationUseCase,
}

impl PaymentReconciliationUseCase {
    pub fn new(resolver: PaymentStatusResolver, activation: SubscriptionActivationUseCase) -> Self {
        Self {
            resolver,
            activation,
        }
    }

    pub async fn reconcile(
        &self,
        payload: &PaymentReconciliationPayload,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let resolution = self
            .resolver
            .resolve(&payload.event_type, payload.payment_id.as_deref())
            .await?;

        let payment = match resolution {
            Resolution::Ignored { event_type } => {
                return Ok(ReconciliationOutcome::Ignored { event_type });
            }
            Resolution::Resolved(payment) => payment,
        };

        if !payment.status.is_approved() {
            info!(
                payment_id = %payment.payment_id,
                status = %payment.status,
                status_detail = payment.status_detail.as_deref().unwrap_or("-"),
                notification_id = ?payload.notification_id,
                "reconciliation: payment not approved; subscription left unchanged"
            );
            return Ok(ReconciliationOutcome::NotApproved {
                payment_id: payment.payment_id,
                status: payment.status,
                status_detail: payment.status_detail,
            });
        }

        let Some(approved_at) = payment.approved_at else {
            warn!(
                payment_id = %payment.payment_id,
                "reconciliation: approved payment carries no timestamp"
            );
            return Err(ReconciliationError::MissingApprovalDate {
                payment_id: payment.payment_id,
            });
        };

        let command = ActivatePaymentCommand {
            user_id: payment.external_reference.clone().unwrap_or_default(),
            payment_id: payment.payment_id.clone(),
            amount: payment.transaction_amount,
            currency: payment.currency_id.clone(),
            approved_at,
        };

        match self
            .activation
            .activate(command)
            .await
            .map_err(ReconciliationError::Store)?
        {
            ActivationOutcome::Activated(record) => Ok(ReconciliationOutcome::Activated {
                user_id: record.user_id,
                payment_id: payment.payment_id,
            }),
            ActivationOutcome::Stale(record) => Ok(ReconciliationOutcome::Stale {
                user_id: record.user_id,
                payment_id: payment.payment_id,
            }),
            ActivationOutcome::Unattributed => Err(ReconciliationError::Unattributed {
                payment_id: payment.payment_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests;
