use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::usecases::notification_replay::{NotificationReplayUseCase, ReplayError};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/notifications/<id>/replay" \
//     -H "Authorization: Bearer $INTERNAL_API_TOKEN"

#[derive(Clone)]
pub struct ReplayRouteState {
    internal_token: Option<Arc<str>>,
    usecase: Arc<NotificationReplayUseCase>,
}

pub fn routes(internal_token: Option<String>, usecase: Arc<NotificationReplayUseCase>) -> Router {
    Router::new()
        .route("/:notification_id/replay", post(replay_notification))
        .with_state(ReplayRouteState {
            internal_token: internal_token.map(Arc::from),
            usecase,
        })
}

#[derive(Debug, Serialize)]
pub struct ReplayResponse {
    pub job_id: Uuid,
}

pub async fn replay_notification(
    State(state): State<ReplayRouteState>,
    headers: HeaderMap,
    Path(notification_id): Path<Uuid>,
) -> Response {
    let Some(expected_token) = state.internal_token.as_deref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"code": 503, "message": "internal token is not configured"})),
        )
            .into_response();
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (
            status,
            Json(json!({"code": status.as_u16(), "message": "unauthorized"})),
        )
            .into_response();
    }

    match state.usecase.replay(notification_id).await {
        Ok(job_id) => (StatusCode::ACCEPTED, Json(ReplayResponse { job_id })).into_response(),
        Err(ReplayError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"code": 404, "message": "notification not found"})),
        )
            .into_response(),
        Err(ReplayError::Internal(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"code": 500, "message": "replay failed"})),
        )
            .into_response(),
    }
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if bool::from(token.as_bytes().ct_eq(expected_token.as_bytes())) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use chrono::Utc;
    use crates::domain::{
        entities::payment_notifications::PaymentNotificationEntity,
        repositories::{
            job::MockJobRepository, payment_notifications::MockPaymentNotificationRepository,
        },
    };
    use tower::ServiceExt;

    fn router(
        token: Option<&str>,
        notifications: MockPaymentNotificationRepository,
        jobs: MockJobRepository,
    ) -> Router {
        let usecase = NotificationReplayUseCase::new(Arc::new(notifications), Arc::new(jobs));
        routes(token.map(str::to_string), Arc::new(usecase))
    }

    fn replay_request(id: Uuid, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/{id}/replay"));
        if let Some(bearer) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {bearer}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn replay_returns_accepted_with_job_id() {
        let job_id = Uuid::new_v4();
        let mut notifications = MockPaymentNotificationRepository::new();
        notifications.expect_find_by_id().returning(|id| {
            Ok(Some(PaymentNotificationEntity {
                id,
                provider: "mercadopago".to_string(),
                event_type: "payment".to_string(),
                payment_id: Some("77".to_string()),
                raw_payload: json!({"type": "payment", "data": {"id": "77"}}),
                received_at: Utc::now(),
                source_address: None,
                client_agent: None,
                signature_status: "verified".to_string(),
            }))
        });
        let mut jobs = MockJobRepository::new();
        jobs.expect_enqueue_payment_reconciliation_job()
            .returning(move |_| Ok(job_id));

        let response = router(Some("secret"), notifications, jobs)
            .oneshot(replay_request(Uuid::new_v4(), Some("secret")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["job_id"], json!(job_id.to_string()));
    }

    #[tokio::test]
    async fn unknown_notification_is_not_found() {
        let mut notifications = MockPaymentNotificationRepository::new();
        notifications.expect_find_by_id().returning(|_| Ok(None));

        let response = router(Some("secret"), notifications, MockJobRepository::new())
            .oneshot(replay_request(Uuid::new_v4(), Some("secret")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized() {
        let mut notifications = MockPaymentNotificationRepository::new();
        notifications.expect_find_by_id().never();

        let response = router(Some("secret"), notifications, MockJobRepository::new())
            .oneshot(replay_request(Uuid::new_v4(), Some("guess")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn bearer_check_rejects_near_misses() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer secret".parse().unwrap());
        assert!(authorize_bearer(&headers, "secret").is_ok());
        assert!(authorize_bearer(&headers, "secreT").is_err());
        assert!(authorize_bearer(&headers, "secret2").is_err());

        headers.insert(AUTHORIZATION, "secret".parse().unwrap());
        assert!(authorize_bearer(&headers, "secret").is_err());
    }

    #[tokio::test]
    async fn unconfigured_token_is_unavailable() {
        let response = router(
            None,
            MockPaymentNotificationRepository::new(),
            MockJobRepository::new(),
        )
        .oneshot(replay_request(Uuid::new_v4(), Some("anything")))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
