pub mod job;
pub mod payment_notifications;
pub mod payment_provider;
pub mod subscriptions;
