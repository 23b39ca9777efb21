//! Session validation port.
//!
//! Turns the access token a browser sends (Bearer header or session cookie)
//! into an [`AuthenticatedUser`]. The gate and the API handlers only see the
//! result, never the token format.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// Implementations must:
/// - Validate the token signature and audience
/// - Return `AuthError::InvalidToken` for malformed/bad signature tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate an access token (without "Bearer " prefix).
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    struct SingleTokenValidator;

    #[async_trait]
    impl SessionValidator for SingleTokenValidator {
        async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
            match token {
                "good" => Ok(AuthenticatedUser::new(
                    UserId::new("user-123").unwrap(),
                    "test@example.com",
                )),
                "old" => Err(AuthError::TokenExpired),
                _ => Err(AuthError::InvalidToken),
            }
        }
    }

    #[tokio::test]
    async fn validator_usable_as_trait_object() {
        let validator: Box<dyn SessionValidator> = Box::new(SingleTokenValidator);

        assert_eq!(validator.validate("good").await.unwrap().id.as_str(), "user-123");
        assert!(matches!(
            validator.validate("old").await,
            Err(AuthError::TokenExpired)
        ));
        assert!(matches!(
            validator.validate("junk").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn session_validator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn SessionValidator>();
    }
}
