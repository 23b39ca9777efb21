//! Access handlers.
//!
//! ## Queries
//! - Page gate decision for a caller
//! - Per-agent usage metering (increments the daily counter when allowed)

mod check_access;
mod check_usage;

pub use check_access::{CheckAccessHandler, CheckAccessQuery};
pub use check_usage::{CheckUsageHandler, CheckUsageQuery};
