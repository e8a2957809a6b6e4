pub mod job;
pub mod payment_notifications;
pub mod subscriptions;
