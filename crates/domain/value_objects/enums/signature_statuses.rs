use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    Verified,
    Invalid,
    Unsigned,
}

impl SignatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureStatus::Verified => "verified",
            SignatureStatus::Invalid => "invalid",
            SignatureStatus::Unsigned => "unsigned",
        }
    }

    /// Unsigned deliveries are still processed because status is always re-fetched from the provider.
    pub fn allows_processing(&self) -> bool {
        !matches!(self, SignatureStatus::Invalid)
    }
}

impl Display for SignatureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
