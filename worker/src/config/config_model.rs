use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub payment_provider: PaymentProvider,
    pub reconciliation: Reconciliation,
    pub internal_api: InternalApi,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct PaymentProvider {
    pub access_token: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub max_attempts: i32,
    pub poll_interval: Duration,
    /// A running job locked for longer than this is handed to another worker.
    pub lock_lease: Duration,
}

#[derive(Debug, Clone)]
pub struct InternalApi {
    /// Replay answers 503 while this is unset.
    pub token: Option<String>,
}
