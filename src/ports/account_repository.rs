//! Account repository port - the credential store behind sign-in.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::domain::foundation::{DomainError, UserId};

/// Creates and finds user accounts.
///
/// Implementations hash the password before storing it; the plaintext never
/// leaves the adapter.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find the account registered with `email` (already normalized).
    async fn find_by_email(&self, email: &str) -> Result<Option<UserId>, DomainError>;

    /// Create an account under a caller-chosen id.
    ///
    /// # Errors
    ///
    /// - `AccountExists` if the email is already registered
    /// - `DatabaseError` on persistence failure
    async fn create(
        &self,
        user_id: &UserId,
        email: &str,
        password: &SecretString,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn AccountRepository) {}
    }
}
