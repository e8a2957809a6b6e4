use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, header::AUTHORIZATION};
use serde::Deserialize;
use tracing::{error, warn};

use crate::domain::{
    repositories::payment_provider::{PaymentProviderClient, PaymentProviderError},
    value_objects::{enums::payment_statuses::PaymentStatus, payments::PaymentDetails},
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.mercadopago.com";

#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    pub access_token: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

/// Mercado Pago REST client built on reqwest.
pub struct MercadoPagoClient {
    http: reqwest::Client,
    access_token: String,
    api_base_url: String,
}

/// Wire shape of `GET /v1/payments/{id}`; only the fields reconciliation reads.
#[derive(Debug, Deserialize)]
pub struct MercadoPagoPayment {
    pub status: Option<String>,
    pub status_detail: Option<String>,
    pub external_reference: Option<String>,
    pub transaction_amount: Option<f64>,
    pub currency_id: Option<String>,
    pub date_approved: Option<DateTime<Utc>>,
    pub date_last_updated: Option<DateTime<Utc>>,
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct MercadoPagoErrorEnvelope {
    message: Option<String>,
    error: Option<String>,
    status: Option<u16>,
}

impl MercadoPagoPayment {
    pub fn into_details(self, payment_id: &str) -> Result<PaymentDetails, PaymentProviderError> {
        let status = self
            .status
            .as_deref()
            .map(PaymentStatus::from_provider)
            .ok_or_else(|| PaymentProviderError::Malformed("payment status missing".to_string()))?;

        Ok(PaymentDetails {
            payment_id: payment_id.to_string(),
            status,
            status_detail: self.status_detail,
            external_reference: self.external_reference,
            transaction_amount: self.transaction_amount,
            currency_id: self.currency_id,
            date_approved: self.date_approved,
            date_last_updated: self.date_last_updated,
            date_created: self.date_created,
        })
    }
}

impl MercadoPagoClient {
    pub fn new(config: MercadoPagoConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            access_token: config.access_token,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn payment_url(&self, payment_id: &str) -> String {
        format!("{}/v1/payments/{}", self.api_base_url, payment_id)
    }

    async fn ensure_success(
        resp: reqwest::Response,
        payment_id: &str,
    ) -> Result<reqwest::Response, PaymentProviderError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let request_id = resp
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (provider_error, provider_message, provider_status) =
            match serde_json::from_str::<MercadoPagoErrorEnvelope>(&body) {
                Ok(envelope) => (envelope.error, envelope.message, envelope.status),
                Err(_) => (None, None, None),
            };

        error!(
            status = %status,
            %payment_id,
            provider_request_id = ?request_id,
            provider_error = ?provider_error,
            provider_message = ?provider_message,
            provider_status = ?provider_status,
            "mercado_pago: payment lookup failed"
        );

        Err(classify_status(status, payment_id))
    }
}

pub fn classify_status(status: StatusCode, payment_id: &str) -> PaymentProviderError {
    match status {
        StatusCode::NOT_FOUND => PaymentProviderError::NotFound(payment_id.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PaymentProviderError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            PaymentProviderError::Unavailable(format!("provider returned {status}"))
        }
        status if status.is_server_error() => {
            PaymentProviderError::Unavailable(format!("provider returned {status}"))
        }
        status => PaymentProviderError::Malformed(format!("unexpected provider status {status}")),
    }
}

fn transport_error(err: reqwest::Error) -> PaymentProviderError {
    if err.is_timeout() {
        return PaymentProviderError::Unavailable("provider request timed out".to_string());
    }
    if err.is_connect() {
        return PaymentProviderError::Unavailable("provider connection failed".to_string());
    }
    PaymentProviderError::Unavailable("provider request failed".to_string())
}

#[async_trait]
impl PaymentProviderClient for MercadoPagoClient {
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails, PaymentProviderError> {
        // https://www.mercadopago.com/developers/en/reference/payments/_payments_id/get
        let resp = self
            .http
            .get(self.payment_url(payment_id))
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(transport_error)?;
        let resp = Self::ensure_success(resp, payment_id).await?;

        let body = resp.bytes().await.map_err(transport_error)?;
        let payment: MercadoPagoPayment = serde_json::from_slice(&body).map_err(|err| {
            warn!(%payment_id, error = %err, "mercado_pago: payment body did not parse");
            PaymentProviderError::Malformed(err.to_string())
        })?;

        payment.into_details(payment_id)
    }
}
