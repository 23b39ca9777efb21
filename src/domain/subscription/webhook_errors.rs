//! Webhook error types for Stripe webhook handling.
//!
//! Only conditions that reject a delivery live here. Processing problems
//! after verification (provider down, database write failed) are reported as
//! acknowledged outcomes instead, so Stripe does not redeliver endlessly.

use http::StatusCode;
use thiserror::Error;

/// Errors that reject a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The Stripe-Signature header is absent.
    #[error("Missing signature header")]
    MissingSignature,

    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the acceptable window (5 minutes).
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// The pending-registration token is unknown or expired.
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),
}

impl WebhookError {
    /// Maps the error to an HTTP status code. All of these are client
    /// errors, so Stripe will not retry them.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::MissingSignature
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingField(_)
            | WebhookError::InvalidRegistration(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable code used in error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            WebhookError::MissingSignature => "MISSING_SIGNATURE",
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::TimestampOutOfRange | WebhookError::InvalidTimestamp => {
                "INVALID_TIMESTAMP"
            }
            WebhookError::ParseError(_) | WebhookError::MissingField(_) => "INVALID_PAYLOAD",
            WebhookError::InvalidRegistration(_) => "INVALID_REGISTRATION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_displays_message() {
        let err = WebhookError::ParseError("invalid JSON".to_string());
        assert_eq!(format!("{}", err), "Parse error: invalid JSON");
    }

    #[test]
    fn missing_field_displays_field_name() {
        let err = WebhookError::MissingField("customer");
        assert_eq!(format!("{}", err), "Missing field: customer");
    }

    #[test]
    fn signature_failures_return_unauthorized() {
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::TimestampOutOfRange.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn missing_signature_returns_bad_request() {
        assert_eq!(
            WebhookError::MissingSignature.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(WebhookError::MissingSignature.error_code(), "MISSING_SIGNATURE");
    }

    #[test]
    fn invalid_registration_returns_bad_request() {
        let err = WebhookError::InvalidRegistration("expired".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "INVALID_REGISTRATION");
    }

    #[test]
    fn every_error_is_a_client_error() {
        let errors = [
            WebhookError::MissingSignature,
            WebhookError::InvalidSignature,
            WebhookError::TimestampOutOfRange,
            WebhookError::InvalidTimestamp,
            WebhookError::ParseError("x".into()),
            WebhookError::MissingField("x"),
            WebhookError::InvalidRegistration("x".into()),
        ];
        for err in errors {
            assert!(err.status_code().is_client_error(), "{:?}", err);
        }
    }
}
