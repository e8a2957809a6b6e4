use super::notifier::{NotificationEvent, NotificationProvider};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use url::Url;

const CONTENT_LIMIT: usize = 2000;

/// Posts alerts to a chat webhook that accepts `{"content": "..."}` (Discord-compatible).
pub(crate) struct AlertWebhookProvider {
    webhook_url: Url,
    client: Client,
}

impl AlertWebhookProvider {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(3))
            .build()?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn format_content(event: &NotificationEvent) -> String {
    let mut lines = vec![
        format!(
            "**{}** `{}` `{}` `{}`",
            event.service_name,
            event.environment,
            event.component,
            event.level.as_str()
        ),
        format!(
            "`{}` `{}`{}",
            event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            event.target,
            match (&event.file, event.line) {
                (Some(file), Some(line)) => format!(" `{file}:{line}`"),
                _ => String::new(),
            }
        ),
    ];

    if !event.correlation.is_empty() {
        let refs = event
            .correlation
            .iter()
            .map(|(key, value)| format!("`{key}={value}`"))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(format!("refs: {refs}"));
    }

    if let Some(message) = event.message.as_ref().filter(|m| !m.trim().is_empty()) {
        lines.push(format!("> {}", message.trim()));
    }

    if !event.spans.is_empty() {
        let span_chain = event
            .spans
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
        lines.push(format!("spans: `{span_chain}`"));
    }

    if !event.fields.is_empty() {
        lines.push("fields:".to_string());
        for (k, v) in &event.fields {
            lines.push(format!("- `{k}` = `{v}`"));
        }
    }

    for span in event.spans.iter().filter(|s| !s.fields.is_empty()) {
        lines.push(format!("span `{}`:", span.name));
        for (k, v) in &span.fields {
            lines.push(format!("- `{k}` = `{v}`"));
        }
    }

    truncate_content(lines.join("\n"))
}

#[async_trait]
impl NotificationProvider for AlertWebhookProvider {
    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": format_content(event) }))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn provider_name(&self) -> &'static str {
        "alert_webhook"
    }
}

// reqwest errors carry the URL, which holds the webhook secret.
fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("alert webhook request timed out");
    }
    if error.is_connect() {
        return anyhow!("alert webhook connection failed");
    }
    anyhow!("alert webhook request failed")
}

fn truncate_content(content: String) -> String {
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }

    let allowed = CONTENT_LIMIT.saturating_sub(SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tracing::Level;

    fn event(message: &str) -> NotificationEvent {
        NotificationEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "payments".to_string(),
            environment: "local".to_string(),
            component: "worker".to_string(),
            target: "worker::payment_reconciliation".to_string(),
            file: Some("worker.rs".to_string()),
            line: Some(10),
            message: Some(message.to_string()),
            fields: BTreeMap::from([("job_id".to_string(), "abc".to_string())]),
            spans: Vec::new(),
            correlation: BTreeMap::from([
                ("job_id", "abc".to_string()),
                ("payment_id", "123".to_string()),
            ]),
        }
    }

    #[test]
    fn formats_header_message_and_fields() {
        let content = format_content(&event("reconciliation: payment orphaned"));

        assert!(content.starts_with("**payments** `local` `worker` `ERROR`"));
        assert!(content.contains("refs: `job_id=abc` `payment_id=123`"));
        assert!(content.contains("> reconciliation: payment orphaned"));
        assert!(content.contains("- `job_id` = `abc`"));
    }

    #[test]
    fn truncates_long_content() {
        let content = format_content(&event(&"x".repeat(5000)));

        assert_eq!(content.chars().count(), CONTENT_LIMIT);
        assert!(content.ends_with("(truncated)"));
    }
}
