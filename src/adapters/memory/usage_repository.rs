//! In-memory usage counters.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::lock;
use crate::domain::foundation::{DomainError, UserId};
use crate::domain::subscription::AgentType;
use crate::ports::UsageRepository;

type UsageKey = (UserId, AgentType, NaiveDate);

#[derive(Debug, Default)]
pub struct InMemoryUsageRepository {
    counts: Mutex<HashMap<UsageKey, u32>>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: &UserId, agent: AgentType, date: NaiveDate, count: u32) {
        lock(&self.counts).insert((user_id.clone(), agent, date), count);
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn count_for(
        &self,
        user_id: &UserId,
        agent: AgentType,
        date: NaiveDate,
    ) -> Result<u32, DomainError> {
        Ok(lock(&self.counts)
            .get(&(user_id.clone(), agent, date))
            .copied()
            .unwrap_or(0))
    }

    async fn try_increment(
        &self,
        user_id: &UserId,
        agent: AgentType,
        date: NaiveDate,
        cap: Option<u32>,
    ) -> Result<Option<u32>, DomainError> {
        let mut counts = lock(&self.counts);
        let count = counts.entry((user_id.clone(), agent, date)).or_insert(0);
        if cap.map_or(false, |cap| *count >= cap) {
            return Ok(None);
        }
        *count += 1;
        Ok(Some(*count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn increments_up_to_cap() {
        let repo = InMemoryUsageRepository::new();
        let user = UserId::new("u1").unwrap();

        assert_eq!(repo.try_increment(&user, AgentType::Validator, day(), Some(1)).await.unwrap(), Some(1));
        assert_eq!(repo.try_increment(&user, AgentType::Validator, day(), Some(1)).await.unwrap(), None);
        assert_eq!(repo.count_for(&user, AgentType::Validator, day()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn counters_are_per_day_and_agent() {
        let repo = InMemoryUsageRepository::new();
        let user = UserId::new("u1").unwrap();
        repo.set(&user, AgentType::Chat, day(), 5);

        assert_eq!(repo.count_for(&user, AgentType::Validator, day()).await.unwrap(), 0);
        let next_day = day().succ_opt().unwrap();
        assert_eq!(repo.count_for(&user, AgentType::Chat, next_day).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn uncapped_always_increments() {
        let repo = InMemoryUsageRepository::new();
        let user = UserId::new("u1").unwrap();
        repo.set(&user, AgentType::Builder, day(), 1_000);

        assert_eq!(repo.try_increment(&user, AgentType::Builder, day(), None).await.unwrap(), Some(1_001));
    }
}
