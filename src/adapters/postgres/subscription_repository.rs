//! PostgreSQL implementation of SubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{corrupt, db_error, user_uuid};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::subscription::{
    PlanType, SubscriptionRecord, SubscriptionStatus, TrialLimitations,
};
use crate::ports::SubscriptionRepository;

const COLUMNS: &str = r#"
    user_id, billing_customer_id, billing_subscription_id, billing_price_id,
    status, plan_type, trial_limitations, trial_ends_at, current_period_end,
    created_at, updated_at
"#;

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        predicate: &str,
        value: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE {} = $1 ORDER BY updated_at DESC LIMIT 1",
            COLUMNS, predicate
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    user_id: Uuid,
    billing_customer_id: Option<String>,
    billing_subscription_id: Option<String>,
    billing_price_id: Option<String>,
    status: String,
    plan_type: String,
    trial_limitations: Option<Json<TrialLimitations>>,
    trial_ends_at: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(SubscriptionRecord {
            user_id: UserId::from_uuid(row.user_id),
            billing_customer_id: row.billing_customer_id,
            billing_subscription_id: row.billing_subscription_id,
            billing_price_id: row.billing_price_id,
            status: row
                .status
                .parse::<SubscriptionStatus>()
                .map_err(|e| corrupt("status", e))?,
            plan_type: row
                .plan_type
                .parse::<PlanType>()
                .map_err(|e| corrupt("plan_type", e))?,
            trial_limitations: row.trial_limitations.map(|Json(limits)| limits),
            trial_ends_at: row.trial_ends_at.map(Timestamp::from_datetime),
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let user_uuid = user_uuid(user_id)?;
        let sql = format!("SELECT {} FROM subscriptions WHERE user_id = $1", COLUMNS);

        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(user_uuid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.find_one("billing_customer_id", customer_id).await
    }

    async fn find_by_billing_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.find_one("billing_subscription_id", subscription_id).await
    }

    async fn upsert_exclusive(
        &self,
        record: &SubscriptionRecord,
        stale_subscription_ids: &[String],
    ) -> Result<(), DomainError> {
        let user_uuid = user_uuid(&record.user_id)?;
        let mut purge: Vec<String> = stale_subscription_ids.to_vec();
        if let Some(id) = &record.billing_subscription_id {
            purge.push(id.clone());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let purged = sqlx::query(
            r#"
            DELETE FROM subscriptions
            WHERE user_id <> $1
              AND (billing_subscription_id = ANY($2)
                   OR ($3::text IS NOT NULL AND billing_customer_id = $3))
            "#,
        )
        .bind(user_uuid)
        .bind(&purge)
        .bind(&record.billing_customer_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to purge stale subscriptions", e))?
        .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                user_id, billing_customer_id, billing_subscription_id, billing_price_id,
                status, plan_type, trial_limitations, trial_ends_at, current_period_end,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) DO UPDATE SET
                billing_customer_id = EXCLUDED.billing_customer_id,
                billing_subscription_id = EXCLUDED.billing_subscription_id,
                billing_price_id = EXCLUDED.billing_price_id,
                status = EXCLUDED.status,
                plan_type = EXCLUDED.plan_type,
                trial_limitations = EXCLUDED.trial_limitations,
                trial_ends_at = EXCLUDED.trial_ends_at,
                current_period_end = EXCLUDED.current_period_end,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_uuid)
        .bind(&record.billing_customer_id)
        .bind(&record.billing_subscription_id)
        .bind(&record.billing_price_id)
        .bind(record.status.as_str())
        .bind(record.plan_type.as_str())
        .bind(record.trial_limitations.map(Json))
        .bind(record.trial_ends_at.map(|t| *t.as_datetime()))
        .bind(record.current_period_end.map(|t| *t.as_datetime()))
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to upsert subscription", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit subscription", e))?;

        if purged > 0 {
            tracing::info!(
                user_id = %record.user_id,
                purged,
                "Removed stale subscription rows"
            );
        }
        Ok(())
    }

    async fn insert_if_absent(&self, record: &SubscriptionRecord) -> Result<bool, DomainError> {
        let user_uuid = user_uuid(&record.user_id)?;

        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                user_id, billing_customer_id, billing_subscription_id, billing_price_id,
                status, plan_type, trial_limitations, trial_ends_at, current_period_end,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_uuid)
        .bind(&record.billing_customer_id)
        .bind(&record.billing_subscription_id)
        .bind(&record.billing_price_id)
        .bind(record.status.as_str())
        .bind(record.plan_type.as_str())
        .bind(record.trial_limitations.map(Json))
        .bind(record.trial_ends_at.map(|t| *t.as_datetime()))
        .bind(record.current_period_end.map(|t| *t.as_datetime()))
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert subscription", e))?;

        Ok(result.rows_affected() == 1)
    }
}
