//! Subscription-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFoundForUser | 404 |
//! | NoBillingRelationship | 404 |
//! | Unauthorized | 401 |
//! | ValidationFailed | 400 |
//! | Upstream | 502 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, UserId};

/// Errors raised by the reconciler, sync and checkout handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// No subscription row exists for this user.
    NotFoundForUser(UserId),

    /// Neither the profile, the subscription row nor the provider knows a
    /// customer for this user.
    NoBillingRelationship(UserId),

    /// No user could be determined for the request.
    Unauthorized,

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// The billing provider failed or was unreachable.
    Upstream(String),

    /// Persistence or other infrastructure failure.
    Infrastructure(String),
}

impl SubscriptionError {
    pub fn not_found_for_user(user_id: UserId) -> Self {
        SubscriptionError::NotFoundForUser(user_id)
    }

    pub fn no_billing_relationship(user_id: UserId) -> Self {
        SubscriptionError::NoBillingRelationship(user_id)
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        SubscriptionError::Upstream(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::NotFoundForUser(_) => ErrorCode::SubscriptionNotFound,
            SubscriptionError::NoBillingRelationship(_) => ErrorCode::NoBillingRelationship,
            SubscriptionError::Unauthorized => ErrorCode::Unauthorized,
            SubscriptionError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            SubscriptionError::Upstream(_) => ErrorCode::UpstreamError,
            SubscriptionError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            SubscriptionError::NotFoundForUser(user_id) => {
                format!("No subscription found for user: {}", user_id)
            }
            SubscriptionError::NoBillingRelationship(user_id) => {
                format!("No billing relationship found for user: {}", user_id)
            }
            SubscriptionError::Unauthorized => "Authentication required".to_string(),
            SubscriptionError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            SubscriptionError::Upstream(msg) => format!("Billing provider error: {}", msg),
            SubscriptionError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SubscriptionError {}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => SubscriptionError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::Unauthorized => SubscriptionError::Unauthorized,
            ErrorCode::UpstreamError => SubscriptionError::Upstream(err.message),
            _ => SubscriptionError::Infrastructure(err.to_string()),
        }
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
