use anyhow::Result;
use crates::domain::repositories::{
    job::JobRepository, payment_notifications::PaymentNotificationRepository,
    payment_provider::PaymentProviderClient, subscriptions::SubscriptionRepository,
};
use crates::infra::db::{
    postgres::postgres_connection,
    repositories::{
        job::JobPostgres, payment_notifications::PaymentNotificationPostgres,
        subscriptions::SubscriptionPostgres,
    },
};
use crates::payments::mercado_pago_client::{MercadoPagoClient, MercadoPagoConfig};
use std::sync::Arc;
use tracing::{error, info};
use worker::{
    axum_http, config,
    payment_reconciliation::worker::{self as reconciliation_worker, ReconciliationWorkerConfig},
    usecases::{
        notification_replay::NotificationReplayUseCase,
        payment_reconciliation::PaymentReconciliationUseCase,
        payment_status_resolver::PaymentStatusResolver,
        subscription_activation::SubscriptionActivationUseCase,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    let lock_lease = chrono::Duration::from_std(dotenvy_env.reconciliation.lock_lease)?;
    let job_repository: Arc<dyn JobRepository + Send + Sync> =
        Arc::new(JobPostgres::new(Arc::clone(&db_pool_arc)).with_lock_lease(lock_lease));

    let subscription_repository: Arc<dyn SubscriptionRepository + Send + Sync> =
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool_arc)));

    let notification_repository: Arc<dyn PaymentNotificationRepository + Send + Sync> =
        Arc::new(PaymentNotificationPostgres::new(Arc::clone(&db_pool_arc)));

    let provider_config = &dotenvy_env.payment_provider;
    let payment_provider: Arc<dyn PaymentProviderClient + Send + Sync> =
        Arc::new(MercadoPagoClient::new(MercadoPagoConfig {
            access_token: provider_config.access_token.clone(),
            api_base_url: provider_config.api_base_url.clone(),
            timeout: provider_config.timeout,
        })?);

    let reconciliation_usecase = Arc::new(PaymentReconciliationUseCase::new(
        PaymentStatusResolver::new(payment_provider, provider_config.timeout),
        SubscriptionActivationUseCase::new(subscription_repository),
    ));

    let replay_usecase = Arc::new(NotificationReplayUseCase::new(
        notification_repository,
        Arc::clone(&job_repository),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let http_server =
        tokio::spawn(async move { axum_http::http_serve::start(server_config, replay_usecase).await });

    let reconciliation_loop = tokio::spawn(reconciliation_worker::run(
        job_repository,
        reconciliation_usecase,
        ReconciliationWorkerConfig {
            max_attempts: dotenvy_env.reconciliation.max_attempts,
            poll_interval: dotenvy_env.reconciliation.poll_interval,
        },
    ));

    tokio::select! {
        result = reconciliation_loop => result??,
        result = http_server => result??,
    };
    Ok(())
}
