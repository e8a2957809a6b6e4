use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crates::domain::{
    repositories::subscriptions::SubscriptionRepository,
    value_objects::subscriptions::{ManualActivationModel, StartTrialModel},
};

use crate::{
    axum_http::{
        error_responses::AppError,
        internal_auth::{InternalToken, require_internal_token},
    },
    usecases::subscriptions::{SubscriptionUseCase, TrialOutcome},
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_BACKEND/api/v1/subscriptions/trial" \
//     -H "Authorization: Bearer $INTERNAL_API_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"user_id":"user_42","force_new":false}'

pub fn routes<T>(usecase: Arc<SubscriptionUseCase<T>>, internal_token: Option<String>) -> Router
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/trial", post(start_trial::<T>))
        .route("/manual-activation", post(activate_manually::<T>))
        .route("/:user_id", get(get_subscription::<T>))
        .route("/:user_id/cancel", post(cancel_subscription::<T>))
        .with_state(usecase)
        .route_layer(middleware::from_fn_with_state(
            InternalToken::new(internal_token),
            require_internal_token,
        ))
}

pub async fn start_trial<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    Json(model): Json<StartTrialModel>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let response = match usecase.start_trial(model).await? {
        TrialOutcome::Created(subscription) => {
            (StatusCode::CREATED, Json(subscription)).into_response()
        }
        TrialOutcome::Existing(subscription) => (StatusCode::OK, Json(subscription)).into_response(),
    };
    Ok(response)
}

pub async fn activate_manually<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    Json(model): Json<ManualActivationModel>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let subscription = usecase.activate_manually(model).await?;
    Ok((StatusCode::OK, Json(subscription)).into_response())
}

pub async fn get_subscription<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    Path(user_id): Path<String>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let subscription = usecase.get_subscription(&user_id).await?;
    Ok((StatusCode::OK, Json(subscription)).into_response())
}

pub async fn cancel_subscription<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    Path(user_id): Path<String>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let subscription = usecase.cancel(&user_id).await?;
    Ok((StatusCode::OK, Json(subscription)).into_response())
}
