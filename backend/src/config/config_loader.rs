use super::{
    config_model::{BackendServer, Database, DotEnvyConfig, InternalApi, PaymentWebhook},
    stage::Stage,
};
use anyhow::{Context, Result, ensure};
use crates::payments::webhook_signature::DEFAULT_SIGNATURE_TOLERANCE_SECS;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: std::env::var("SERVER_PORT_BACKEND")
            .context("SERVER_PORT_BACKEND is invalid")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
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

    let signature_tolerance_secs: i64 = optional_env("MERCADO_PAGO_WEBHOOK_TOLERANCE_SECS")
        .map(|raw| raw.parse())
        .transpose()
        .context("MERCADO_PAGO_WEBHOOK_TOLERANCE_SECS is invalid")?
        .unwrap_or(DEFAULT_SIGNATURE_TOLERANCE_SECS);
    ensure!(
        signature_tolerance_secs > 0,
        "MERCADO_PAGO_WEBHOOK_TOLERANCE_SECS must be positive"
    );

    let payment_webhook = PaymentWebhook {
        secret: optional_env("MERCADO_PAGO_WEBHOOK_SECRET"),
        signature_tolerance_secs,
    };

    let internal_api = InternalApi {
        token: optional_env("INTERNAL_API_TOKEN"),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        payment_webhook,
        internal_api,
        stage: get_stage(),
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or_default();
    Stage::try_from(stage_str.as_str()).unwrap_or_default()
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}
