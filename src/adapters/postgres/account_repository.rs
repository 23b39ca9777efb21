//! PostgreSQL implementation of AccountRepository.
//!
//! Passwords are hashed with argon2 before they reach the database.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, user_uuid};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::AccountRepository;

/// PostgreSQL implementation of the AccountRepository port.
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn hash_password(password: &SecretString) -> Result<String, DomainError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::new(ErrorCode::InternalError, format!("Password hashing failed: {}", e)))
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserId>, DomainError> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to look up account", e))?;

        Ok(id.map(UserId::from_uuid))
    }

    async fn create(
        &self,
        user_id: &UserId,
        email: &str,
        password: &SecretString,
    ) -> Result<(), DomainError> {
        let id = user_uuid(user_id)?;
        let password = password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))??;

        sqlx::query("INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(email)
            .bind(&password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.constraint() == Some("users_email_key") {
                        return DomainError::new(
                            ErrorCode::AccountExists,
                            format!("account already exists for {}", email),
                        );
                    }
                }
                db_error("Failed to create account", e)
            })?;

        Ok(())
    }
}
