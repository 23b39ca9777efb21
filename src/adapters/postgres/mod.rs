//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresSubscriptionRepository` - One row per user, exclusive upserts
//! - `PostgresProfileRepository` - Profiles and their billing mirror
//! - `PostgresPendingRegistrationRepository` - Registrations awaiting payment
//! - `PostgresAccountRepository` - Credentials, argon2-hashed
//! - `PostgresUsageRepository` - Daily per-agent counters with a capped increment

mod account_repository;
mod pending_registration_repository;
mod profile_repository;
mod subscription_repository;
mod usage_repository;

pub use account_repository::PostgresAccountRepository;
pub use pending_registration_repository::PostgresPendingRegistrationRepository;
pub use profile_repository::PostgresProfileRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use usage_repository::PostgresUsageRepository;

use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};

/// User ids are UUIDs in the database.
fn user_uuid(user_id: &UserId) -> Result<Uuid, DomainError> {
    user_id.to_uuid().map_err(|e| {
        DomainError::new(
            ErrorCode::ValidationFailed,
            format!("User ID must be a valid UUID: {}", e),
        )
    })
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::database(format!("{}: {}", context, err))
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::database(format!("Invalid {} value: {}", column, err))
}
