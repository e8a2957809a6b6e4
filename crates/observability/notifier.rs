use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::mpsc, time::Instant};
use tracing::{Level, warn};

const QUEUE_CAPACITY: usize = 256;
const DEFAULT_REPEAT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub(crate) struct SpanSummary {
    pub(crate) name: String,
    pub(crate) fields: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub(crate) struct NotificationEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) file: Option<String>,
    pub(crate) line: Option<u32>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) spans: Vec<SpanSummary>,
    /// Payment, notification, job and user ids found on the event or its spans.
    pub(crate) correlation: BTreeMap<&'static str, String>,
}

impl NotificationEvent {
    /// Retries of one failing job log the same message for the same payment;
    /// they share a key and collapse into one alert per window.
    pub(crate) fn repeat_key(&self) -> String {
        let ids = self
            .correlation
            .iter()
            .filter(|(key, _)| **key != "job_id")
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}|{}|{}",
            self.target,
            self.message.as_deref().unwrap_or_default(),
            ids
        )
    }
}

#[async_trait]
pub(crate) trait NotificationProvider: Send + Sync {
    async fn send(&self, event: &NotificationEvent) -> Result<()>;
    fn provider_name(&self) -> &'static str;
}

/// Hands events to a background task so logging never waits on the network.
#[derive(Clone)]
pub(crate) struct Notifier {
    tx: mpsc::Sender<NotificationEvent>,
}

impl Notifier {
    pub(crate) fn new(providers: Vec<Arc<dyn NotificationProvider>>) -> Self {
        Self::with_repeat_window(providers, DEFAULT_REPEAT_WINDOW)
    }

    pub(crate) fn with_repeat_window(
        providers: Vec<Arc<dyn NotificationProvider>>,
        repeat_window: Duration,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<NotificationEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            let mut last_sent: HashMap<String, Instant> = HashMap::new();

            while let Some(event) = rx.recv().await {
                let now = Instant::now();
                last_sent.retain(|_, sent_at| now.duration_since(*sent_at) < repeat_window);

                let key = event.repeat_key();
                if last_sent.contains_key(&key) {
                    continue;
                }
                last_sent.insert(key, now);

                for provider in &providers {
                    if let Err(error) = provider.send(&event).await {
                        warn!(
                            provider = provider.provider_name(),
                            error = %error,
                            "observability: alert provider failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn try_notify(&self, event: NotificationEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("observability: alert queue full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("observability: alert queue closed; dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn event(message: &str, payment_id: &str, job_id: &str) -> NotificationEvent {
        NotificationEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "svc".to_string(),
            environment: "test".to_string(),
            component: "worker".to_string(),
            target: "worker::payment_reconciliation".to_string(),
            file: None,
            line: None,
            message: Some(message.to_string()),
            fields: BTreeMap::new(),
            spans: Vec::new(),
            correlation: BTreeMap::from([
                ("payment_id", payment_id.to_string()),
                ("job_id", job_id.to_string()),
            ]),
        }
    }

    struct ForwardingProvider {
        tx: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl NotificationProvider for ForwardingProvider {
        async fn send(&self, event: &NotificationEvent) -> Result<()> {
            let payment_id = event.correlation.get("payment_id").cloned().unwrap_or_default();
            self.tx.send(payment_id)?;
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "forwarding"
        }
    }

    struct RecordingProvider {
        seen: Mutex<Vec<String>>,
        delivered: Notify,
    }

    #[async_trait]
    impl NotificationProvider for RecordingProvider {
        async fn send(&self, event: &NotificationEvent) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(event.message.clone().unwrap_or_default());
            self.delivered.notify_one();
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn delivers_events_to_providers() {
        let provider = Arc::new(RecordingProvider {
            seen: Mutex::new(Vec::new()),
            delivered: Notify::new(),
        });
        let notifier = Notifier::new(vec![provider.clone() as Arc<dyn NotificationProvider>]);

        notifier.try_notify(NotificationEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "svc".to_string(),
            environment: "test".to_string(),
            component: "worker".to_string(),
            target: "t".to_string(),
            file: None,
            line: None,
            message: Some("boom".to_string()),
            fields: BTreeMap::new(),
            spans: Vec::new(),
            correlation: BTreeMap::new(),
        });

        provider.delivered.notified().await;
        assert_eq!(provider.seen.lock().unwrap().as_slice(), ["boom".to_string()]);
    }

    #[tokio::test]
    async fn retries_for_the_same_payment_alert_once_per_window() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::with_repeat_window(
            vec![Arc::new(ForwardingProvider { tx }) as Arc<dyn NotificationProvider>],
            Duration::from_secs(60),
        );

        notifier.try_notify(event("reconciliation: store unavailable", "p1", "job-a"));
        notifier.try_notify(event("reconciliation: store unavailable", "p1", "job-b"));
        notifier.try_notify(event("reconciliation: store unavailable", "p2", "job-c"));

        assert_eq!(rx.recv().await.as_deref(), Some("p1"));
        assert_eq!(rx.recv().await.as_deref(), Some("p2"));
        assert!(rx.try_recv().is_err());
    }
}
