use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, Query, State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, Uri, header::USER_AGENT},
    response::{IntoResponse, Response},
    routing::post,
};
use crates::domain::value_objects::payment_webhook::{PAYMENT_PROVIDER, PaymentWebhookQuery};
use serde_json::json;
use tracing::{error, warn};

use crate::usecases::payment_webhook::{InboundDelivery, PaymentWebhookUseCase};

// Provider setup: notification URL https://<host>/webhooks/payment
//   curl -X POST "http://localhost:$SERVER_PORT_BACKEND/webhooks/payment?type=payment&data.id=123" \
//     -H "Content-Type: application/json" \
//     -d '{"type":"payment","data":{"id":"123"}}'

/// The webhook route carries its own limits instead of the server-wide layers,
/// whose 408/413 responses would break the always-200 contract.
#[derive(Debug, Clone)]
pub struct WebhookLimits {
    pub body_limit_bytes: usize,
    /// Past this, the delivery keeps processing in the background and is acknowledged.
    pub ack_timeout: Duration,
}

#[derive(Clone)]
struct WebhookState {
    usecase: Arc<PaymentWebhookUseCase>,
    ack_timeout: Duration,
}

pub fn routes(usecase: Arc<PaymentWebhookUseCase>, limits: WebhookLimits) -> Router {
    Router::new()
        .route(
            "/payment",
            post(receive_payment_notification).get(payment_webhook_status),
        )
        .layer(DefaultBodyLimit::max(limits.body_limit_bytes))
        .with_state(WebhookState {
            usecase,
            ack_timeout: limits.ack_timeout,
        })
}

/// Always answers 200 so the provider never retries because of our own failures.
async fn receive_payment_notification(
    State(state): State<WebhookState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    // An oversized or unreadable body is recorded empty; the query string may still identify it.
    let body = body.unwrap_or_else(|rejection| {
        warn!(
            error = %rejection,
            status = %rejection.status(),
            "payment_webhook: body rejected; recording delivery without it"
        );
        Bytes::new()
    });

    // A query string that does not parse is treated as absent rather than rejected.
    let query = Query::<PaymentWebhookQuery>::try_from_uri(&uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    let delivery = InboundDelivery {
        body: body.to_vec(),
        query,
        signature_header: header_string(&headers, "x-signature"),
        request_id: header_string(&headers, "x-request-id"),
        source_address: source_address(&headers, connect_info.map(|ConnectInfo(addr)| addr)),
        client_agent: header_string(&headers, USER_AGENT.as_str()),
    };

    let usecase = Arc::clone(&state.usecase);
    let processing = tokio::spawn(async move { usecase.receive(delivery).await });

    match tokio::time::timeout(state.ack_timeout, processing).await {
        Ok(Ok(_)) => {}
        Ok(Err(join_err)) => {
            error!(error = %join_err, "payment_webhook: delivery processing task failed");
        }
        Err(_) => warn!(
            ack_timeout_ms = state.ack_timeout.as_millis() as u64,
            "payment_webhook: delivery still processing; acknowledging now"
        ),
    }

    (StatusCode::OK, Json(json!({ "status": "success" }))).into_response()
}

pub async fn payment_webhook_status() -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": "active", "provider": PAYMENT_PROVIDER })),
    )
        .into_response()
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First hop of `x-forwarded-for`, else the socket peer.
fn source_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    header_string(headers, "x-forwarded-for")
        .and_then(|forwarded| {
            forwarded
                .split(',')
                .next()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use crates::domain::{
        entities::payment_notifications::{
            InsertPaymentNotificationEntity, PaymentNotificationEntity,
        },
        repositories::{
            job::{JobRepository, MockJobRepository},
            payment_notifications::{
                MockPaymentNotificationRepository, PaymentNotificationRepository,
            },
        },
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn limits() -> WebhookLimits {
        WebhookLimits {
            body_limit_bytes: 64 * 1024,
            ack_timeout: Duration::from_secs(5),
        }
    }

    fn app_with(
        notifications: impl PaymentNotificationRepository + Send + Sync + 'static,
        jobs: impl JobRepository + Send + Sync + 'static,
        limits: WebhookLimits,
    ) -> Router {
        routes(
            Arc::new(PaymentWebhookUseCase::new(
                Arc::new(notifications),
                Arc::new(jobs),
                None,
            )),
            limits,
        )
    }

    fn app(notifications: MockPaymentNotificationRepository, jobs: MockJobRepository) -> Router {
        app_with(notifications, jobs, limits())
    }

    struct StalledAuditLog;

    #[async_trait]
    impl PaymentNotificationRepository for StalledAuditLog {
        async fn append(&self, _entity: InsertPaymentNotificationEntity) -> anyhow::Result<Uuid> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(anyhow!("statement timeout"))
        }

        async fn find_by_id(
            &self,
            _notification_id: Uuid,
        ) -> anyhow::Result<Option<PaymentNotificationEntity>> {
            Ok(None)
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn acknowledges_even_when_every_store_is_down() {
        let mut notifications = MockPaymentNotificationRepository::new();
        notifications
            .expect_append()
            .returning(|_| Err(anyhow!("database is down")));
        let mut jobs = MockJobRepository::new();
        jobs.expect_enqueue_payment_reconciliation_job()
            .returning(|_| Err(anyhow!("database is down")));

        let response = app(notifications, jobs)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payment")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"payment","data":{"id":"pay_1"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "success" }));
    }

    #[tokio::test]
    async fn acknowledges_malformed_bodies_and_reads_query_fallbacks() {
        let mut notifications = MockPaymentNotificationRepository::new();
        notifications
            .expect_append()
            .withf(|entity| {
                entity.event_type == "payment"
                    && entity.source_address.as_deref() == Some("198.51.100.4")
            })
            .times(1)
            .returning(|entity| Ok(entity.id));
        let mut jobs = MockJobRepository::new();
        jobs.expect_enqueue_payment_reconciliation_job()
            .withf(|payload| payload.payment_id.as_deref() == Some("987"))
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));

        let response = app(notifications, jobs)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payment?type=payment&data.id=987")
                    .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
                    .body(Body::from("not-json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_is_still_acknowledged_and_recorded() {
        let mut notifications = MockPaymentNotificationRepository::new();
        notifications
            .expect_append()
            .withf(|entity| {
                entity.payment_id.as_deref() == Some("42") && entity.raw_payload == json!("")
            })
            .times(1)
            .returning(|entity| Ok(entity.id));
        let mut jobs = MockJobRepository::new();
        jobs.expect_enqueue_payment_reconciliation_job()
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));

        let response = app_with(
            notifications,
            jobs,
            WebhookLimits {
                body_limit_bytes: 16,
                ..limits()
            },
        )
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payment?type=payment&data.id=42")
                .body(Body::from("x".repeat(4096)))
                .unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stalled_store_does_not_delay_the_acknowledgement() {
        let app = app_with(
            StalledAuditLog,
            MockJobRepository::new(),
            WebhookLimits {
                ack_timeout: Duration::from_millis(50),
                ..limits()
            },
        );

        let response = tokio::time::timeout(
            Duration::from_secs(5),
            app.oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payment")
                    .body(Body::from(r#"{"type":"payment","data":{"id":"pay_1"}}"#))
                    .unwrap(),
            ),
        )
        .await
        .expect("acknowledged before the store returned")
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "success" }));
    }

    #[tokio::test]
    async fn get_reports_liveness() {
        let response = app(
            MockPaymentNotificationRepository::new(),
            MockJobRepository::new(),
        )
        .oneshot(
            Request::builder()
                .uri("/payment")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "active");
    }
}
