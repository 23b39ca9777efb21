//! PostgreSQL implementation of PendingRegistrationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{corrupt, db_error, user_uuid};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::registration::{PendingRegistration, PhoneVerification, RegistrationToken};
use crate::ports::PendingRegistrationRepository;

/// PostgreSQL implementation of the PendingRegistrationRepository port.
pub struct PostgresPendingRegistrationRepository {
    pool: PgPool,
}

impl PostgresPendingRegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PendingRegistrationRow {
    token: String,
    user_id: uuid::Uuid,
    email: String,
    password_encrypted: String,
    phone_verification_id: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PhoneVerificationRow {
    id: String,
    verified_at: Option<DateTime<Utc>>,
    consumed_at: Option<DateTime<Utc>>,
}

impl From<PhoneVerificationRow> for PhoneVerification {
    fn from(row: PhoneVerificationRow) -> Self {
        PhoneVerification {
            id: row.id,
            verified_at: row.verified_at.map(Timestamp::from_datetime),
            consumed_at: row.consumed_at.map(Timestamp::from_datetime),
        }
    }
}

impl TryFrom<PendingRegistrationRow> for PendingRegistration {
    type Error = DomainError;

    fn try_from(row: PendingRegistrationRow) -> Result<Self, Self::Error> {
        Ok(PendingRegistration {
            token: RegistrationToken::new(row.token).map_err(|e| corrupt("token", e))?,
            user_id: UserId::from_uuid(row.user_id),
            email: row.email,
            password_encrypted: row.password_encrypted,
            phone_verification_id: row.phone_verification_id,
            expires_at: Timestamp::from_datetime(row.expires_at),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl PendingRegistrationRepository for PostgresPendingRegistrationRepository {
    async fn save(&self, pending: &PendingRegistration) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO pending_registrations (
                token, user_id, email, password_encrypted, phone_verification_id,
                expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(pending.token.as_str())
        .bind(user_uuid(&pending.user_id)?)
        .bind(&pending.email)
        .bind(&pending.password_encrypted)
        .bind(&pending.phone_verification_id)
        .bind(pending.expires_at.as_datetime())
        .bind(pending.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("pending_registrations_pkey") {
                    return DomainError::new(
                        ErrorCode::ValidationFailed,
                        "registration token already exists",
                    );
                }
            }
            db_error("Failed to save pending registration", e)
        })?;

        Ok(())
    }

    async fn find_by_token(
        &self,
        token: &RegistrationToken,
    ) -> Result<Option<PendingRegistration>, DomainError> {
        let row: Option<PendingRegistrationRow> = sqlx::query_as(
            r#"
            SELECT token, user_id, email, password_encrypted, phone_verification_id,
                   expires_at, created_at
            FROM pending_registrations
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load pending registration", e))?;

        row.map(PendingRegistration::try_from).transpose()
    }

    async fn delete(&self, token: &RegistrationToken) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM pending_registrations WHERE token = $1")
            .bind(token.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete pending registration", e))?;
        Ok(())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM pending_registrations WHERE expires_at <= $1")
            .bind(now.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to purge pending registrations", e))?;
        Ok(result.rows_affected())
    }

    async fn find_phone_verification(
        &self,
        verification_id: &str,
    ) -> Result<Option<PhoneVerification>, DomainError> {
        let row: Option<PhoneVerificationRow> = sqlx::query_as(
            "SELECT id, verified_at, consumed_at FROM phone_verifications WHERE id = $1",
        )
        .bind(verification_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load phone verification", e))?;

        Ok(row.map(PhoneVerification::from))
    }

    async fn consume_phone_verification(
        &self,
        verification_id: &str,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE phone_verifications
            SET consumed_at = now()
            WHERE id = $1 AND consumed_at IS NULL
            "#,
        )
        .bind(verification_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to consume phone verification", e))?;
        Ok(result.rows_affected() == 1)
    }
}
