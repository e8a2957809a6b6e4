pub mod job_statuses;
pub mod payment_statuses;
pub mod plan_types;
pub mod signature_statuses;
pub mod subscription_statuses;
