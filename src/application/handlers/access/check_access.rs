//! CheckAccessHandler - Query handler for the page gate.

use std::sync::Arc;

use crate::domain::access::{evaluate_gate, AccessDecision};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::subscription::SubscriptionRecord;
use crate::domain::user::Profile;
use crate::ports::{ProfileRepository, SubscriptionRepository};

/// Query to decide whether a caller may open a protected page.
#[derive(Debug, Clone)]
pub struct CheckAccessQuery {
    /// `None` when the request carried no valid session.
    pub user_id: Option<UserId>,
}

/// Handler for the access gate.
///
/// Called on every protected page load; reads two rows and never calls the
/// billing provider.
pub struct CheckAccessHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl CheckAccessHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            subscriptions,
            profiles,
        }
    }

    /// Never fails: a read error yields [`AccessDecision::fail_closed`].
    pub async fn handle(&self, query: CheckAccessQuery) -> AccessDecision {
        let Some(user_id) = query.user_id else {
            return evaluate_gate(None, None, None, &Timestamp::now());
        };

        match self.load(&user_id).await {
            Ok((subscription, profile)) => evaluate_gate(
                Some(&user_id),
                subscription.as_ref(),
                profile.as_ref(),
                &Timestamp::now(),
            ),
            Err(err) => {
                tracing::error!(user_id = %user_id, error = %err, "Access check failed, denying");
                AccessDecision::fail_closed()
            }
        }
    }

    async fn load(
        &self,
        user_id: &UserId,
    ) -> Result<(Option<SubscriptionRecord>, Option<Profile>), DomainError> {
        let subscription = self.subscriptions.find_by_user_id(user_id).await?;
        // The profile only matters when there is no row yet.
        let profile = match subscription {
            Some(_) => None,
            None => self.profiles.find_by_id(user_id).await?,
        };
        Ok((subscription, profile))
    }
}
