//! Registration domain - pending registrations exchanged for accounts once
//! checkout completes.

mod errors;
mod pending;

pub use errors::{RegistrationError, RegistrationOutcome};
pub use pending::{PendingRegistration, PhoneVerification, RegistrationToken};
