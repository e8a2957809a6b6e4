use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use crates::domain::{
    repositories::{
        payment_provider::{MockPaymentProviderClient, PaymentProviderError},
        subscriptions::MockSubscriptionRepository,
    },
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payment_reconciliation::PaymentReconciliationPayload, payments::PaymentDetails,
    },
};

use super::*;
use crate::usecases::{
    payment_status_resolver::PaymentStatusResolver,
    subscription_activation::SubscriptionActivationUseCase,
    test_support::InMemorySubscriptionStore,
};

fn approved_at() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::hours(1)
}

fn payment(id: &str, status: PaymentStatus, reference: Option<&str>, at: DateTime<Utc>) -> PaymentDetails {
    PaymentDetails {
        payment_id: id.to_string(),
        status_detail: match status {
            PaymentStatus::Approved => Some("accredited".to_string()),
            _ => Some("cc_rejected_insufficient_amount".to_string()),
        },
        status,
        external_reference: reference.map(str::to_string),
        transaction_amount: Some(19.9),
        currency_id: Some("BRL".to_string()),
        date_approved: Some(at),
        date_last_updated: Some(at),
        date_created: Some(at - chrono::Duration::minutes(5)),
    }
}

fn payload(payment_id: &str) -> PaymentReconciliationPayload {
    PaymentReconciliationPayload {
        notification_id: None,
        event_type: "payment".to_string(),
        payment_id: Some(payment_id.to_string()),
    }
}

fn usecase(
    provider: MockPaymentProviderClient,
    store: Arc<InMemorySubscriptionStore>,
) -> PaymentReconciliationUseCase {
    PaymentReconciliationUseCase::new(
        PaymentStatusResolver::new(Arc::new(provider), Duration::from_secs(1)),
        SubscriptionActivationUseCase::new(store),
    )
}

#[tokio::test]
async fn approved_payment_activates_subscription() {
    let at = approved_at();
    let mut provider = MockPaymentProviderClient::new();
    provider
        .expect_get_payment()
        .times(1)
        .returning(move |id| Ok(payment(id, PaymentStatus::Approved, Some("user-1"), at)));
    let store = Arc::new(InMemorySubscriptionStore::default());

    let outcome = usecase(provider, store.clone())
        .reconcile(&payload("123"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ReconciliationOutcome::Activated {
            user_id: "user-1".to_string(),
            payment_id: "123".to_string()
        }
    );
    let record = store.get("user-1").unwrap();
    assert_eq!(record.subscription_id, "payment_123");
    assert!(record.is_active);
}

#[tokio::test]
async fn repeated_deliveries_converge_to_one_record() {
    let at = approved_at();
    let mut provider = MockPaymentProviderClient::new();
    provider
        .expect_get_payment()
        .times(4)
        .returning(move |id| Ok(payment(id, PaymentStatus::Approved, Some("user-1"), at)));
    let store = Arc::new(InMemorySubscriptionStore::default());
    let usecase = usecase(provider, store.clone());

    let first = usecase.reconcile(&payload("123")).await.unwrap();
    let after_first = store.get("user-1").unwrap();
    for _ in 0..3 {
        let outcome = usecase.reconcile(&payload("123")).await.unwrap();
        assert!(matches!(outcome, ReconciliationOutcome::Stale { .. }));
    }

    assert!(matches!(first, ReconciliationOutcome::Activated { .. }));
    assert_eq!(store.len(), 1);
    assert_eq!(store.writes(), 1);
    assert_eq!(store.get("user-1").unwrap(), after_first);
}

#[tokio::test]
async fn concurrent_duplicate_deliveries_write_once() {
    let at = approved_at();
    let mut provider = MockPaymentProviderClient::new();
    provider
        .expect_get_payment()
        .times(2)
        .returning(move |id| Ok(payment(id, PaymentStatus::Approved, Some("user-1"), at)));
    let store = Arc::new(InMemorySubscriptionStore::default());
    let usecase = usecase(provider, store.clone());
    let delivery = payload("123");

    let (left, right) = tokio::join!(usecase.reconcile(&delivery), usecase.reconcile(&delivery));

    let outcomes = [left.unwrap(), right.unwrap()];
    let activated = outcomes
        .iter()
        .filter(|o| matches!(o, ReconciliationOutcome::Activated { .. }))
        .count();
    assert_eq!(activated, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.writes(), 1);
    assert_eq!(
        store.get("user-1").unwrap().expires_at,
        Some(at + chrono::Duration::days(30))
    );
}

#[tokio::test]
async fn rejected_payment_leaves_store_untouched() {
    let mut provider = MockPaymentProviderClient::new();
    provider
        .expect_get_payment()
        .returning(|id| Ok(payment(id, PaymentStatus::Rejected, Some("user-1"), approved_at())));
    let mut repo = MockSubscriptionRepository::new();
    repo.expect_upsert_by_user_id().never();
    let usecase = PaymentReconciliationUseCase::new(
        PaymentStatusResolver::new(Arc::new(provider), Duration::from_secs(1)),
        SubscriptionActivationUseCase::new(Arc::new(repo)),
    );

    let outcome = usecase.reconcile(&payload("123")).await.unwrap();

    assert_eq!(
        outcome,
        ReconciliationOutcome::NotApproved {
            payment_id: "123".to_string(),
            status: PaymentStatus::Rejected,
            status_detail: Some("cc_rejected_insufficient_amount".to_string()),
        }
    );
}

#[tokio::test]
async fn approved_payment_without_reference_is_dead_lettered() {
    let mut provider = MockPaymentProviderClient::new();
    provider
        .expect_get_payment()
        .returning(|id| Ok(payment(id, PaymentStatus::Approved, None, approved_at())));
    let store = Arc::new(InMemorySubscriptionStore::default());

    let err = usecase(provider, store.clone())
        .reconcile(&payload("123"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconciliationError::Unattributed { .. }));
    assert!(!err.is_retryable());
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn unknown_event_type_is_a_no_op() {
    let mut provider = MockPaymentProviderClient::new();
    provider.expect_get_payment().never();
    let store = Arc::new(InMemorySubscriptionStore::default());

    let outcome = usecase(provider, store.clone())
        .reconcile(&PaymentReconciliationPayload {
            notification_id: None,
            event_type: "plan".to_string(),
            payment_id: Some("999".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ReconciliationOutcome::Ignored {
            event_type: "plan".to_string()
        }
    );
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn provider_outage_is_retryable_and_writes_nothing() {
    let mut provider = MockPaymentProviderClient::new();
    provider
        .expect_get_payment()
        .returning(|_| Err(PaymentProviderError::Unavailable("503".to_string())));
    let store = Arc::new(InMemorySubscriptionStore::default());

    let err = usecase(provider, store.clone())
        .reconcile(&payload("123"))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn out_of_order_delivery_keeps_newest_payment() {
    let newer = Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap();
    let older = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
    let mut provider = MockPaymentProviderClient::new();
    provider.expect_get_payment().returning(move |id| {
        let at = if id == "new" { newer } else { older };
        Ok(payment(id, PaymentStatus::Approved, Some("user-1"), at))
    });
    let store = Arc::new(InMemorySubscriptionStore::default());
    let usecase = usecase(provider, store.clone());

    usecase.reconcile(&payload("new")).await.unwrap();
    let outcome = usecase.reconcile(&payload("old")).await.unwrap();

    assert!(matches!(outcome, ReconciliationOutcome::Stale { .. }));
    assert_eq!(
        store.get("user-1").unwrap().last_payment_id.as_deref(),
        Some("new")
    );
}

#[tokio::test]
async fn store_outage_is_retryable() {
    let mut provider = MockPaymentProviderClient::new();
    provider
        .expect_get_payment()
        .returning(|id| Ok(payment(id, PaymentStatus::Approved, Some("user-1"), approved_at())));
    let mut repo = MockSubscriptionRepository::new();
    repo.expect_upsert_by_user_id()
        .returning(|_| Err(anyhow::anyhow!("pool timed out")));
    let usecase = PaymentReconciliationUseCase::new(
        PaymentStatusResolver::new(Arc::new(provider), Duration::from_secs(1)),
        SubscriptionActivationUseCase::new(Arc::new(repo)),
    );

    let err = usecase.reconcile(&payload("123")).await.unwrap_err();

    assert!(matches!(err, ReconciliationError::Store(_)));
    assert!(err.is_retryable());
}
