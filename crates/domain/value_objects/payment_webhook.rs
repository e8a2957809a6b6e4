use serde::Deserialize;
use serde_json::Value;

pub const PAYMENT_PROVIDER: &str = "mercadopago";
pub const PAYMENT_EVENT_TYPE: &str = "payment";
pub const UNKNOWN_EVENT_TYPE: &str = "unknown";

/// Query parameters the provider appends to the notification URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentWebhookQuery {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub topic: Option<String>,
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
    pub id: Option<String>,
}

/// Event classification and payment reference pulled out of a delivery.
///
/// The body shape varies by event type, so nothing here is required: the body
/// wins, the query string fills the gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentEventRef {
    pub event_type: Option<String>,
    pub payment_id: Option<String>,
}

impl PaymentEventRef {
    pub fn extract(body: &Value, query: &PaymentWebhookQuery) -> Self {
        let event_type = body
            .get("type")
            .and_then(non_empty_scalar)
            .or_else(|| body.get("topic").and_then(non_empty_scalar))
            .or_else(|| non_empty(query.type_.as_deref()))
            .or_else(|| non_empty(query.topic.as_deref()));

        let payment_id = body
            .get("data")
            .and_then(|data| data.get("id"))
            .and_then(non_empty_scalar)
            .or_else(|| non_empty(query.data_id.as_deref()))
            .or_else(|| non_empty(query.id.as_deref()));

        Self {
            event_type,
            payment_id,
        }
    }

    pub fn event_type_or_unknown(&self) -> String {
        self.event_type
            .clone()
            .unwrap_or_else(|| UNKNOWN_EVENT_TYPE.to_string())
    }
}

fn non_empty_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => non_empty(Some(raw)),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
