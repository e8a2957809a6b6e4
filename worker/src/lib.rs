pub mod axum_http;
pub mod config;
pub mod payment_reconciliation;
pub mod usecases;
