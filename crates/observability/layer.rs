use super::config::ServiceContext;
use super::notifier::{NotificationEvent, Notifier, SpanSummary};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    span::{Attributes, Id, Record},
};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

#[derive(Clone)]
pub(crate) struct AlertLayer {
    notifier: Notifier,
    service_context: ServiceContext,
    min_level: Level,
}

impl AlertLayer {
    pub(crate) fn new(
        notifier: Notifier,
        service_context: ServiceContext,
        min_level: Level,
    ) -> Self {
        Self {
            notifier,
            service_context,
            min_level,
        }
    }
}

#[derive(Default)]
struct FieldMapVisitor {
    values: BTreeMap<String, String>,
}

impl FieldMapVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        self.values
            .insert(field.name().to_string(), redact(field.name(), value));
    }
}

impl Visit for FieldMapVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }
}

#[derive(Default)]
struct SpanFieldMap {
    values: BTreeMap<String, String>,
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FieldMapVisitor::default();
        attrs.record(&mut visitor);

        if visitor.values.is_empty() {
            return;
        }

        if let Some(span) = ctx.span(id) {
            span.extensions_mut()
                .insert(SpanFieldMap { values: visitor.values });
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = FieldMapVisitor::default();
        values.record(&mut visitor);

        if visitor.values.is_empty() {
            return;
        }

        let mut extensions = span.extensions_mut();
        if let Some(existing) = extensions.get_mut::<SpanFieldMap>() {
            existing.values.extend(visitor.values);
        } else {
            extensions.insert(SpanFieldMap {
                values: visitor.values,
            });
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        // More verbose levels compare greater.
        if *event.metadata().level() > self.min_level {
            return;
        }

        let mut visitor = FieldMapVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .values
            .remove("message")
            .map(|raw| unquote_debug_string(&raw));

        let spans = ctx
            .event_span(event)
            .map(|span| {
                span.scope()
                    .from_root()
                    .map(|s| SpanSummary {
                        name: s.metadata().name().to_string(),
                        fields: s
                            .extensions()
                            .get::<SpanFieldMap>()
                            .map(|m| m.values.clone())
                            .unwrap_or_default(),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let correlation = correlation_ids(&visitor.values, &spans);

        let notification = NotificationEvent {
            level: *event.metadata().level(),
            timestamp: Utc::now(),
            service_name: self.service_context.service_name.clone(),
            environment: self.service_context.environment.clone(),
            component: self.service_context.component.clone(),
            target: event.metadata().target().to_string(),
            file: event.metadata().file().map(|f| f.to_string()),
            line: event.metadata().line(),
            message,
            fields: visitor.values,
            spans,
            correlation,
        };

        self.notifier.try_notify(notification);
    }
}

const CORRELATION_KEYS: &[&str] = &["payment_id", "notification_id", "job_id", "user_id"];

/// Event fields win over span fields; among spans the innermost wins.
fn correlation_ids(
    fields: &BTreeMap<String, String>,
    spans: &[SpanSummary],
) -> BTreeMap<&'static str, String> {
    CORRELATION_KEYS
        .iter()
        .filter_map(|key| {
            fields
                .get(*key)
                .or_else(|| spans.iter().rev().find_map(|span| span.fields.get(*key)))
                .map(|value| unquote_debug_string(value))
                .filter(|value| !value.is_empty() && value != "None")
                .map(|value| (*key, strip_some(&value)))
        })
        .collect()
}

/// `?Option<String>` fields arrive as `Some("123")`.
fn strip_some(value: &str) -> String {
    value
        .strip_prefix("Some(")
        .and_then(|rest| rest.strip_suffix(')'))
        .map(unquote_debug_string)
        .unwrap_or_else(|| value.to_string())
}

fn unquote_debug_string(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}

fn redact(field_name: &str, value: String) -> String {
    if is_sensitive_key(field_name) {
        return "[REDACTED]".to_string();
    }
    value
}

const SENSITIVE_KEY_PARTS: &[&str] = &[
    "webhook_url",
    "secret",
    "x_signature",
    "signature_header",
    "token",
    "authorization",
];

fn is_sensitive_key(field_name: &str) -> bool {
    let field = field_name.to_ascii_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| field.contains(part))
}
