mod alert_webhook;
mod config;
mod layer;
mod notifier;

use alert_webhook::AlertWebhookProvider;
use anyhow::Result;
use config::ObservabilityConfig;
use layer::AlertLayer;
use notifier::Notifier;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Installs the global subscriber: fmt output filtered by `RUST_LOG` (default `info`)
/// plus an optional alert sink for events at or above `ALERT_NOTIFY_LEVEL`.
///
/// Must run inside a tokio runtime when alerts are enabled.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);
    let mut warnings = config.warnings.clone();

    let alert_layer = match config.alert.as_ref() {
        Some(alert) => match AlertWebhookProvider::new(alert.webhook_url.clone()) {
            Ok(provider) => {
                let notifier = Notifier::new(vec![Arc::new(provider)]);
                Some(
                    AlertLayer::new(notifier, config.service_context.clone(), alert.min_level)
                        .with_filter(LevelFilter::from_level(alert.min_level)),
                )
            }
            Err(err) => {
                warnings.push(format!("alert webhook client failed to build: {err}"));
                None
            }
        },
        None => None,
    };
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local time so a configured TZ shows up in log timestamps.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    let context = &config.service_context;
    for warning in &warnings {
        warn!(
            service = %context.service_name,
            environment = %context.environment,
            component = %context.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %context.service_name,
        environment = %context.environment,
        component = %context.component,
        alerts_enabled,
        "observability: initialized"
    );

    Ok(())
}
