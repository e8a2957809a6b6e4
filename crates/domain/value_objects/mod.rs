pub mod enums;
pub mod payment_reconciliation;
pub mod payment_webhook;
pub mod payments;
pub mod subscriptions;
