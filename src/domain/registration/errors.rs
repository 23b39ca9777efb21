//! Registration exchange errors.

use thiserror::Error;

use crate::domain::foundation::UserId;

/// Errors raised while exchanging a pending registration for an account.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// No pending registration for the token and no account for the email.
    #[error("Registration token not found")]
    TokenNotFound,

    /// The pending registration outlived its TTL.
    #[error("Registration token expired")]
    Expired,

    /// The email belongs to an account this registration did not create.
    #[error("Email is registered to another account")]
    AccountConflict,

    /// Stored credentials could not be decrypted.
    #[error("Stored credentials are unreadable: {0}")]
    CredentialsUnreadable(String),

    /// A repository write failed.
    #[error("Registration persistence failed: {0}")]
    Persistence(String),
}

impl RegistrationError {
    /// Token problems reject the delivery; everything else is transient.
    pub fn is_invalid_token(&self) -> bool {
        matches!(
            self,
            RegistrationError::TokenNotFound
                | RegistrationError::Expired
                | RegistrationError::AccountConflict
                | RegistrationError::CredentialsUnreadable(_)
        )
    }
}

/// Result of a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A new account was created for the token.
    Created { user_id: UserId },
    /// The account already existed (duplicate delivery or replay).
    AlreadyRegistered { user_id: UserId },
}

impl RegistrationOutcome {
    pub fn user_id(&self) -> &UserId {
        match self {
            RegistrationOutcome::Created { user_id }
            | RegistrationOutcome::AlreadyRegistered { user_id } => user_id,
        }
    }

    pub fn is_new_account(&self) -> bool {
        matches!(self, RegistrationOutcome::Created { .. })
    }
}
