pub mod payment_webhook;
pub mod subscriptions;
