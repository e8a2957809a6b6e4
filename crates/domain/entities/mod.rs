pub mod jobs;
pub mod payment_notifications;
pub mod subscriptions;
