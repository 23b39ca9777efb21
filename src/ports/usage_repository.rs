//! Usage repository port - daily counters keyed by (user, agent, date).

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::subscription::AgentType;

/// Daily per-agent usage counters.
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Today's count for one agent. Missing rows count as zero.
    async fn count_for(
        &self,
        user_id: &UserId,
        agent: AgentType,
        date: NaiveDate,
    ) -> Result<u32, DomainError>;

    /// Increments the counter unless it already reached `cap`.
    ///
    /// Must be atomic: concurrent calls may never push the count past the
    /// cap. Returns the new count, or `None` when the cap was already
    /// reached. `cap: None` always increments.
    async fn try_increment(
        &self,
        user_id: &UserId,
        agent: AgentType,
        date: NaiveDate,
        cap: Option<u32>,
    ) -> Result<Option<u32>, DomainError>;
}
