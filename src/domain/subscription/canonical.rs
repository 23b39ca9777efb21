//! Canonical subscription selection for a customer with several provider
//! subscriptions (typically a trial later superseded by a direct upgrade).

use std::cmp::Ordering;

use super::BillingSubscription;

/// The subscription to persist and the ids to purge in the same write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSelection {
    pub canonical: BillingSubscription,
    pub stale_ids: Vec<String>,
}

/// Picks the subscription that represents the customer.
///
/// Preference order:
/// 1. live and flagged upgrade or direct, most recent first
/// 2. most recent live
/// 3. most recent of any status
///
/// Creation ties are broken on the id so the choice is deterministic.
pub fn select_canonical(subs: &[BillingSubscription]) -> Option<CanonicalSelection> {
    let canonical = most_recent(subs.iter().filter(|s| s.status.is_live() && s.is_flagged_direct()))
        .or_else(|| most_recent(subs.iter().filter(|s| s.status.is_live())))
        .or_else(|| most_recent(subs.iter()))?
        .clone();

    let mut stale_ids: Vec<String> = subs
        .iter()
        .filter(|s| s.id != canonical.id)
        .map(|s| s.id.clone())
        .collect();
    stale_ids.sort();
    stale_ids.dedup();

    Some(CanonicalSelection {
        canonical,
        stale_ids,
    })
}

fn most_recent<'a>(
    subs: impl Iterator<Item = &'a BillingSubscription>,
) -> Option<&'a BillingSubscription> {
    subs.max_by(|a, b| recency(a, b))
}

fn recency(a: &BillingSubscription, b: &BillingSubscription) -> Ordering {
    a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id))
}
