//! In-memory adapters.
//!
//! Process-local implementations of the persistence ports, used by tests
//! and by local runs without Postgres. Each supports write-failure injection
//! so the retry and deferral paths can be exercised.

mod account_repository;
mod pending_registration_repository;
mod profile_repository;
mod subscription_repository;
mod usage_repository;

pub use account_repository::InMemoryAccountRepository;
pub use pending_registration_repository::InMemoryPendingRegistrationRepository;
pub use profile_repository::InMemoryProfileRepository;
pub use subscription_repository::InMemorySubscriptionRepository;
pub use usage_repository::InMemoryUsageRepository;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::foundation::DomainError;

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts down injected write failures.
#[derive(Debug, Default)]
struct FailureSwitch(AtomicU32);

impl FailureSwitch {
    fn arm(&self, times: u32) {
        self.0.store(times, Ordering::SeqCst);
    }

    /// Consumes one armed failure, if any.
    fn check(&self, operation: &str) -> Result<(), DomainError> {
        let took = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            Err(DomainError::database(format!("simulated {} failure", operation)))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_switch_fails_exactly_armed_times() {
        let switch = FailureSwitch::default();
        assert!(switch.check("write").is_ok());

        switch.arm(2);
        assert!(switch.check("write").is_err());
        assert!(switch.check("write").is_err());
        assert!(switch.check("write").is_ok());
    }
}
