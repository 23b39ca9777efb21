//! Subscription status as persisted locally and as reported by the provider.
//!
//! The provider knows more states than the local model cares about, so
//! [`BillingStatus`] is folded into the six-state [`SubscriptionStatus`] at
//! the reconciliation boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Local subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Checkout initiated, provider has not confirmed anything yet.
    Pending,
    /// Inside the provider-side trial period.
    Trialing,
    /// Paid and current.
    Active,
    /// Renewal payment failed.
    PastDue,
    /// Subscription ended.
    Canceled,
    /// First payment requires further action.
    Incomplete,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 6] = [
        SubscriptionStatus::Pending,
        SubscriptionStatus::Trialing,
        SubscriptionStatus::Active,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Canceled,
        SubscriptionStatus::Incomplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
        }
    }

    /// Statuses that deny access whatever the plan.
    pub fn is_terminal_for_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Canceled | SubscriptionStatus::PastDue)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubscriptionStatus::Pending),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

/// Subscription status as reported by the billing provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BillingStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
    Unknown(String),
}

impl BillingStatus {
    /// Parses the provider's status string. Never fails; unknown values are kept.
    pub fn parse(s: &str) -> Self {
        match s {
            "trialing" => BillingStatus::Trialing,
            "active" => BillingStatus::Active,
            "past_due" => BillingStatus::PastDue,
            "canceled" => BillingStatus::Canceled,
            "incomplete" => BillingStatus::Incomplete,
            "incomplete_expired" => BillingStatus::IncompleteExpired,
            "unpaid" => BillingStatus::Unpaid,
            "paused" => BillingStatus::Paused,
            other => BillingStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BillingStatus::Trialing => "trialing",
            BillingStatus::Active => "active",
            BillingStatus::PastDue => "past_due",
            BillingStatus::Canceled => "canceled",
            BillingStatus::Incomplete => "incomplete",
            BillingStatus::IncompleteExpired => "incomplete_expired",
            BillingStatus::Unpaid => "unpaid",
            BillingStatus::Paused => "paused",
            BillingStatus::Unknown(s) => s,
        }
    }

    /// Live subscriptions are candidates for the canonical row.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            BillingStatus::Active | BillingStatus::Trialing | BillingStatus::Incomplete
        )
    }

    /// Folds the provider status into the local model.
    ///
    /// Unknown statuses deny access until the provider reports something we
    /// understand.
    pub fn to_local(&self) -> SubscriptionStatus {
        match self {
            BillingStatus::Trialing => SubscriptionStatus::Trialing,
            BillingStatus::Active => SubscriptionStatus::Active,
            BillingStatus::Incomplete => SubscriptionStatus::Incomplete,
            BillingStatus::PastDue | BillingStatus::Unpaid | BillingStatus::Paused => {
                SubscriptionStatus::PastDue
            }
            BillingStatus::Canceled | BillingStatus::IncompleteExpired => {
                SubscriptionStatus::Canceled
            }
            BillingStatus::Unknown(raw) => {
                tracing::warn!(status = %raw, "Unknown billing status, treating as past_due");
                SubscriptionStatus::PastDue
            }
        }
    }
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
