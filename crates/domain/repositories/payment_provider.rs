use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::value_objects::payments::PaymentDetails;

#[derive(Debug, Error)]
pub enum PaymentProviderError {
    #[error("payment not found: {0}")]
    NotFound(String),
    #[error("provider rejected credentials")]
    Unauthorized,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl PaymentProviderError {
    /// Whether the same lookup may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentProviderError::Unavailable(_) | PaymentProviderError::Unauthorized
        )
    }
}

#[automock]
#[async_trait]
pub trait PaymentProviderClient {
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails, PaymentProviderError>;
}
