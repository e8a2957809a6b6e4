use crate::{
    axum_http::{
        default_routers,
        routers::{self, payment_webhook::WebhookLimits},
    },
    config::config_model::DotEnvyConfig,
    usecases::{payment_webhook::PaymentWebhookUseCase, subscriptions::SubscriptionUseCase},
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::infra::db::{
    postgres::postgres_connection::PgPoolSquad,
    repositories::{
        job::JobPostgres, payment_notifications::PaymentNotificationPostgres,
        subscriptions::SubscriptionPostgres,
    },
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let payment_webhook_usecase = Arc::new(
        PaymentWebhookUseCase::new(
            Arc::new(PaymentNotificationPostgres::new(Arc::clone(&db_pool))),
            Arc::new(JobPostgres::new(Arc::clone(&db_pool))),
            config.payment_webhook.secret.clone(),
        )
        .with_signature_tolerance(chrono::Duration::seconds(
            config.payment_webhook.signature_tolerance_secs,
        )),
    );

    let subscription_usecase = Arc::new(SubscriptionUseCase::new(
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        config.stage,
    ));

    if config.payment_webhook.secret.is_none() {
        info!("MERCADO_PAGO_WEBHOOK_SECRET is not set; webhook signatures will not be checked");
    }

    let body_limit_bytes: usize = (config.backend_server.body_limit * 1024 * 1024).try_into()?;
    let request_timeout = Duration::from_secs(config.backend_server.timeout);

    let api = Router::new()
        .nest(
            "/api/v1/subscriptions",
            routers::subscriptions::routes(
                subscription_usecase,
                config.internal_api.token.clone(),
            ),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestBodyLimitLayer::new(body_limit_bytes));

    let webhooks = routers::payment_webhook::routes(
        payment_webhook_usecase,
        WebhookLimits {
            body_limit_bytes,
            ack_timeout: request_timeout,
        },
    );

    let app = Router::new()
        .nest("/webhooks", webhooks)
        .merge(api)
        .fallback(default_routers::not_found)
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(stage = %config.stage, "Server is running on port {}", config.backend_server.port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
