use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub payment_webhook: PaymentWebhook,
    pub internal_api: InternalApi,
    pub stage: Stage,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct PaymentWebhook {
    /// When unset, deliveries are accepted unsigned.
    pub secret: Option<String>,
    pub signature_tolerance_secs: i64,
}

#[derive(Debug, Clone)]
pub struct InternalApi {
    pub token: Option<String>,
}
