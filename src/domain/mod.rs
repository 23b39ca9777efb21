//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, auth)
//! - `subscription` - Billing state, plan resolution, webhook payloads
//! - `access` - Page gate and per-agent usage policy
//! - `registration` - Pending registrations awaiting payment
//! - `user` - Profile rows and their billing mirror

pub mod access;
pub mod foundation;
pub mod registration;
pub mod subscription;
pub mod user;
