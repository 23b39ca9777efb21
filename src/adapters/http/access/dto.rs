//! Response bodies for the access endpoints.

use serde::Serialize;

use crate::domain::access::UsageOutcome;

/// Result of a usage check. `remaining` is absent for unlimited plans and
/// `reason` only appears on denials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl From<UsageOutcome> for UsageResponse {
    fn from(outcome: UsageOutcome) -> Self {
        match outcome {
            UsageOutcome::Allowed { remaining } => Self {
                allowed: true,
                remaining,
                reason: None,
            },
            UsageOutcome::Denied { reason } => Self {
                allowed: false,
                remaining: None,
                reason: Some(reason.code()),
            },
        }
    }
}
