pub mod notification_replay;
pub mod payment_reconciliation;
pub mod payment_status_resolver;
pub mod subscription_activation;

#[cfg(test)]
pub(crate) mod test_support;
