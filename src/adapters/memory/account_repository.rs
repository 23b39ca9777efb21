//! In-memory account repository.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::SecretString;

use super::{lock, FailureSwitch};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::AccountRepository;

/// Accounts keyed by email. Passwords are dropped; nothing here signs in.
#[derive(Debug, Default)]
pub struct InMemoryAccountRepository {
    accounts: Mutex<HashMap<String, UserId>>,
    write_failures: FailureSwitch,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an existing account.
    pub fn insert(&self, email: &str, user_id: UserId) {
        lock(&self.accounts).insert(email.to_string(), user_id);
    }

    pub fn count(&self) -> usize {
        lock(&self.accounts).len()
    }

    pub fn fail_next_writes(&self, times: u32) {
        self.write_failures.arm(times);
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserId>, DomainError> {
        Ok(lock(&self.accounts).get(email).cloned())
    }

    async fn create(
        &self,
        user_id: &UserId,
        email: &str,
        _password: &SecretString,
    ) -> Result<(), DomainError> {
        self.write_failures.check("account create")?;
        let mut accounts = lock(&self.accounts);
        if accounts.contains_key(email) {
            return Err(DomainError::new(
                ErrorCode::AccountExists,
                format!("account already exists for {}", email),
            ));
        }
        accounts.insert(email.to_string(), user_id.clone());
        Ok(())
    }
}
