//! PostgreSQL implementation of ProfileRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{corrupt, db_error, user_uuid};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::subscription::{SubscriptionRecord, SubscriptionStatus};
use crate::domain::user::Profile;
use crate::ports::ProfileRepository;

/// PostgreSQL implementation of the ProfileRepository port.
pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    email: String,
    stripe_customer_id: Option<String>,
    subscription_status: Option<String>,
    trial_ends_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let subscription_status = row
            .subscription_status
            .map(|s| s.parse::<SubscriptionStatus>())
            .transpose()
            .map_err(|e| corrupt("subscription_status", e))?;

        Ok(Profile {
            id: UserId::from_uuid(row.id),
            email: row.email,
            stripe_customer_id: row.stripe_customer_id,
            subscription_status,
            trial_ends_at: row.trial_ends_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn create(&self, profile: &Profile) -> Result<(), DomainError> {
        let id = user_uuid(&profile.id)?;

        sqlx::query(
            r#"
            INSERT INTO profiles (id, email, stripe_customer_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&profile.email)
        .bind(&profile.stripe_customer_id)
        .bind(profile.created_at.as_datetime())
        .bind(profile.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create profile", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, DomainError> {
        let id = user_uuid(id)?;

        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT id, email, stripe_customer_id, subscription_status, trial_ends_at,
                   created_at, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load profile", e))?;

        row.map(Profile::try_from).transpose()
    }

    async fn find_by_customer_id(&self, customer_id: &str) -> Result<Option<Profile>, DomainError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT id, email, stripe_customer_id, subscription_status, trial_ends_at,
                   created_at, updated_at
            FROM profiles
            WHERE stripe_customer_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load profile by customer", e))?;

        row.map(Profile::try_from).transpose()
    }

    async fn set_stripe_customer_id(
        &self,
        id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        let uuid = user_uuid(id)?;

        let result = sqlx::query(
            "UPDATE profiles SET stripe_customer_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(uuid)
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to set customer on profile", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::NotFound,
                format!("profile {}", id),
            ));
        }
        Ok(())
    }

    async fn mirror_subscription(&self, record: &SubscriptionRecord) -> Result<(), DomainError> {
        let uuid = user_uuid(&record.user_id)?;

        sqlx::query(
            r#"
            UPDATE profiles SET
                stripe_customer_id = COALESCE($2, stripe_customer_id),
                subscription_status = $3,
                trial_ends_at = $4,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(uuid)
        .bind(&record.billing_customer_id)
        .bind(record.status.as_str())
        .bind(record.trial_ends_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mirror subscription onto profile", e))?;

        Ok(())
    }
}
