use std::env;
use tracing::Level;
use url::Url;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alert: Option<AlertConfig>,
    /// Collected while parsing and logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        let component = component.trim().to_string();

        let service_name = env_string("SERVICE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = env_string("STAGE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let (alert, warnings) = alert_from_env();

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            alert,
            warnings,
        }
    }
}

fn alert_from_env() -> (Option<AlertConfig>, Vec<String>) {
    let mut warnings = Vec::new();

    if !env_bool("ALERT_NOTIFY_ENABLED").unwrap_or(true) {
        return (None, warnings);
    }

    let Some(raw_url) = env_string("ALERT_WEBHOOK_URL").filter(|v| !v.trim().is_empty()) else {
        return (None, warnings);
    };

    let webhook_url = match Url::parse(raw_url.trim()) {
        Ok(url) => url,
        Err(err) => {
            // The URL embeds a secret, so only the parse error is reported.
            warnings.push(format!(
                "ALERT_WEBHOOK_URL is set but invalid; alerts disabled (parse error: {err})"
            ));
            return (None, warnings);
        }
    };

    let min_level = match env_string("ALERT_NOTIFY_LEVEL") {
        Some(raw) if !raw.trim().is_empty() => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ALERT_NOTIFY_LEVEL is invalid (value: {raw}); defaulting to ERROR"
            ));
            Level::ERROR
        }),
        _ => Level::ERROR,
    };

    (
        Some(AlertConfig {
            webhook_url,
            min_level,
        }),
        warnings,
    )
}

pub(crate) fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!(parse_level("ERROR"), Some(Level::ERROR));
        assert_eq!(parse_level(" warning "), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }
}
