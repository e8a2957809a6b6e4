use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::payment_provider::{PaymentProviderClient, PaymentProviderError},
    value_objects::{
        enums::payment_statuses::PaymentStatus, payment_webhook::PAYMENT_EVENT_TYPE,
        payments::PaymentDetails,
    },
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPayment {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    pub external_reference: Option<String>,
    pub transaction_amount: Option<f64>,
    pub currency_id: Option<String>,
    /// Approval date, or the provider's last-updated/created date when absent.
    pub approved_at: Option<DateTime<Utc>>,
}

impl From<PaymentDetails> for ResolvedPayment {
    fn from(details: PaymentDetails) -> Self {
        Self {
            approved_at: details.effective_at(),
            external_reference: details.attributed_user_id().map(str::to_string),
            payment_id: details.payment_id,
            status: details.status,
            status_detail: details.status_detail,
            transaction_amount: details.transaction_amount,
            currency_id: details.currency_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Event types other than payments are acknowledged without a lookup.
    Ignored { event_type: String },
    Resolved(ResolvedPayment),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("payment event carries no payment id")]
    MissingPaymentId,
    #[error(transparent)]
    Provider(#[from] PaymentProviderError),
}

pub struct PaymentStatusResolver {
    provider: Arc<dyn PaymentProviderClient + Send + Sync>,
    timeout: Duration,
}

impl PaymentStatusResolver {
    pub fn new(provider: Arc<dyn PaymentProviderClient + Send + Sync>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Fetches the authoritative state of the payment behind an event.
    ///
    /// A lookup that outlives `timeout` fails as `Unavailable`; nothing is
    /// inferred from the notification body.
    pub async fn resolve(
        &self,
        event_type: &str,
        payment_id: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        if event_type != PAYMENT_EVENT_TYPE {
            info!(%event_type, "reconciliation: ignoring non-payment event");
            return Ok(Resolution::Ignored {
                event_type: event_type.to_string(),
            });
        }

        let payment_id = payment_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ResolveError::MissingPaymentId)?;

        let details = tokio::time::timeout(self.timeout, self.provider.get_payment(payment_id))
            .await
            .map_err(|_| {
                warn!(
                    %payment_id,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "reconciliation: payment lookup timed out"
                );
                PaymentProviderError::Unavailable(format!(
                    "lookup exceeded {}s",
                    self.timeout.as_secs_f64()
                ))
            })??;

        info!(
            %payment_id,
            status = %details.status,
            status_detail = details.status_detail.as_deref().unwrap_or("-"),
            has_external_reference = details.attributed_user_id().is_some(),
            "reconciliation: payment resolved"
        );

        Ok(Resolution::Resolved(details.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use crates::domain::repositories::payment_provider::MockPaymentProviderClient;

    fn approved_details() -> PaymentDetails {
        PaymentDetails {
            payment_id: "123".to_string(),
            status: PaymentStatus::Approved,
            status_detail: Some("accredited".to_string()),
            external_reference: Some(" user-1 ".to_string()),
            transaction_amount: Some(29.9),
            currency_id: Some("BRL".to_string()),
            date_approved: None,
            date_last_updated: Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()),
            date_created: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    fn resolver(provider: impl PaymentProviderClient + Send + Sync + 'static) -> PaymentStatusResolver {
        PaymentStatusResolver::new(Arc::new(provider), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn ignores_non_payment_events_without_calling_provider() {
        let mut provider = MockPaymentProviderClient::new();
        provider.expect_get_payment().never();

        let resolution = resolver(provider)
            .resolve("merchant_order", Some("123"))
            .await
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Ignored {
                event_type: "merchant_order".to_string()
            }
        );
    }

    #[tokio::test]
    async fn payment_event_without_id_is_rejected() {
        let mut provider = MockPaymentProviderClient::new();
        provider.expect_get_payment().never();

        let err = resolver(provider).resolve("payment", Some("  ")).await.unwrap_err();

        assert!(matches!(err, ResolveError::MissingPaymentId));
    }

    #[tokio::test]
    async fn resolves_with_fallback_timestamp_and_trimmed_reference() {
        let mut provider = MockPaymentProviderClient::new();
        provider
            .expect_get_payment()
            .withf(|payment_id| payment_id == "123")
            .times(1)
            .returning(|_| Ok(approved_details()));

        let resolution = resolver(provider).resolve("payment", Some("123")).await.unwrap();

        let Resolution::Resolved(payment) = resolution else {
            panic!("expected a resolved payment");
        };
        assert_eq!(payment.status, PaymentStatus::Approved);
        assert_eq!(payment.external_reference.as_deref(), Some("user-1"));
        assert_eq!(
            payment.approved_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn provider_errors_pass_through() {
        let mut provider = MockPaymentProviderClient::new();
        provider
            .expect_get_payment()
            .returning(|id| Err(PaymentProviderError::NotFound(id.to_string())));

        let err = resolver(provider).resolve("payment", Some("404")).await.unwrap_err();

        assert!(matches!(
            err,
            ResolveError::Provider(PaymentProviderError::NotFound(_))
        ));
    }

    struct HangingProvider;

    #[async_trait]
    impl PaymentProviderClient for HangingProvider {
        async fn get_payment(
            &self,
            _payment_id: &str,
        ) -> Result<PaymentDetails, PaymentProviderError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn slow_lookup_fails_closed_as_unavailable() {
        let resolver =
            PaymentStatusResolver::new(Arc::new(HangingProvider), Duration::from_millis(20));

        let err = resolver.resolve("payment", Some("123")).await.unwrap_err();

        match err {
            ResolveError::Provider(provider_err) => assert!(provider_err.is_retryable()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
