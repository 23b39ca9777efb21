//! PostgreSQL implementation of UsageRepository.
//!
//! The capped increment is a single statement, so concurrent agent calls
//! cannot push a counter past its cap.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use super::{db_error, user_uuid};
use crate::domain::foundation::{DomainError, UserId};
use crate::domain::subscription::AgentType;
use crate::ports::UsageRepository;

/// PostgreSQL implementation of the UsageRepository port.
pub struct PostgresUsageRepository {
    pool: PgPool,
}

impl PostgresUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[async_trait]
impl UsageRepository for PostgresUsageRepository {
    async fn count_for(
        &self,
        user_id: &UserId,
        agent: AgentType,
        date: NaiveDate,
    ) -> Result<u32, DomainError> {
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT usage_count FROM usage_tracking
            WHERE user_id = $1 AND agent_type = $2 AND usage_date = $3
            "#,
        )
        .bind(user_uuid(user_id)?)
        .bind(agent.as_str())
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to read usage", e))?;

        Ok(count.map(to_count).unwrap_or(0))
    }

    async fn try_increment(
        &self,
        user_id: &UserId,
        agent: AgentType,
        date: NaiveDate,
        cap: Option<u32>,
    ) -> Result<Option<u32>, DomainError> {
        // A NULL cap never blocks. A cap of zero blocks the first insert too.
        let cap = cap.map(|c| i32::try_from(c).unwrap_or(i32::MAX));
        if cap == Some(0) {
            return Ok(None);
        }

        let count: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO usage_tracking (user_id, agent_type, usage_date, usage_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (user_id, agent_type, usage_date) DO UPDATE
                SET usage_count = usage_tracking.usage_count + 1,
                    updated_at = now()
                WHERE $4::int IS NULL OR usage_tracking.usage_count < $4::int
            RETURNING usage_count
            "#,
        )
        .bind(user_uuid(user_id)?)
        .bind(agent.as_str())
        .bind(date)
        .bind(cap)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to increment usage", e))?;

        Ok(count.map(to_count))
    }
}
