use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Provider payment status collapsed to the states reconciliation cares about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Approved,
    Rejected,
    Pending,
    Other(String),
}

impl PaymentStatus {
    pub fn from_provider(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" => PaymentStatus::Approved,
            "rejected" => PaymentStatus::Rejected,
            "pending" | "in_process" => PaymentStatus::Pending,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, PaymentStatus::Approved)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_provider_statuses() {
        assert_eq!(PaymentStatus::from_provider("approved"), PaymentStatus::Approved);
        assert_eq!(PaymentStatus::from_provider("REJECTED"), PaymentStatus::Rejected);
        assert_eq!(PaymentStatus::from_provider("in_process"), PaymentStatus::Pending);
        assert_eq!(
            PaymentStatus::from_provider("refunded"),
            PaymentStatus::Other("refunded".to_string())
        );
    }
}
