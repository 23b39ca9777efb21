//! Registration handlers.
//!
//! ## Commands
//! - Exchanging a pending registration for an account after checkout

mod complete_registration;

pub use complete_registration::{CompleteRegistrationCommand, CompleteRegistrationHandler};
