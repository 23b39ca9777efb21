//! Access domain - page gate and per-agent usage metering.
//!
//! Both read persisted state only; nothing here calls the billing provider.

mod gate;
mod usage;

pub use gate::{evaluate_gate, AccessDecision, GateReason, RedirectTarget, FALLBACK_TRIAL_DAYS};
pub use usage::{usage_policy, UsageDenial, UsageOutcome, UsagePolicy};
