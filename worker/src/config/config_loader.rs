use super::config_model::{
    Database, DotEnvyConfig, InternalApi, PaymentProvider, Reconciliation, WorkerServer,
};
use anyhow::{Context, Result, ensure};
use crates::payments::mercado_pago_client::DEFAULT_API_BASE_URL;
use std::time::Duration;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: std::env::var("SERVER_PORT_WORKER")
            .context("SERVER_PORT_WORKER is invalid")?
            .parse()
            .context("SERVER_PORT_WORKER is invalid")?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .context("SERVER_BODY_LIMIT is invalid")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .context("SERVER_TIMEOUT is invalid")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").context("DATABASE_URL is invalid")?,
    };

    let timeout_secs: u64 = std::env::var("PAYMENT_PROVIDER_TIMEOUT_SECS")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .context("PAYMENT_PROVIDER_TIMEOUT_SECS is invalid")?;
    ensure!(timeout_secs > 0, "PAYMENT_PROVIDER_TIMEOUT_SECS must be positive");

    let payment_provider = PaymentProvider {
        access_token: optional_env("MERCADO_PAGO_ACCESS_TOKEN")
            .context("MERCADO_PAGO_ACCESS_TOKEN is invalid")?,
        api_base_url: optional_env("MERCADO_PAGO_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        timeout: Duration::from_secs(timeout_secs),
    };

    let max_attempts: i32 = std::env::var("RECONCILIATION_MAX_ATTEMPTS")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .context("RECONCILIATION_MAX_ATTEMPTS is invalid")?;
    ensure!(max_attempts > 0, "RECONCILIATION_MAX_ATTEMPTS must be positive");

    let poll_interval_secs: u64 = std::env::var("RECONCILIATION_POLL_INTERVAL_SECS")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .context("RECONCILIATION_POLL_INTERVAL_SECS is invalid")?;

    let lock_lease_secs: u64 = std::env::var("RECONCILIATION_LOCK_LEASE_SECS")
        .unwrap_or_else(|_| "300".to_string())
        .parse()
        .context("RECONCILIATION_LOCK_LEASE_SECS is invalid")?;
    ensure!(
        lock_lease_secs > timeout_secs,
        "RECONCILIATION_LOCK_LEASE_SECS must exceed PAYMENT_PROVIDER_TIMEOUT_SECS"
    );

    let reconciliation = Reconciliation {
        max_attempts,
        poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
        lock_lease: Duration::from_secs(lock_lease_secs),
    };

    let internal_api = InternalApi {
        token: optional_env("INTERNAL_API_TOKEN"),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        payment_provider,
        reconciliation,
        internal_api,
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}
