//! Agent Billing - subscription reconciliation and access gating
//!
//! Keeps one subscription row per user in step with Stripe (webhooks and
//! pull sync share one reconciler), registers new users once their checkout
//! completes, and decides on every protected page load and agent call
//! whether the caller's plan allows it.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
