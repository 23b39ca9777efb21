//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionRepository` - One subscription row per user
//! - `ProfileRepository` - Profiles and their billing mirror
//! - `PendingRegistrationRepository` - Registrations awaiting payment
//! - `AccountRepository` - Credential store
//! - `UsageRepository` - Daily per-agent counters
//!
//! ## External Service Ports
//!
//! - `BillingProvider` - Stripe API
//! - `CredentialCipher` - Reversible encryption of pending credentials
//! - `SessionValidator` - Access token validation

mod account_repository;
mod billing_provider;
mod credential_cipher;
mod pending_registration_repository;
mod profile_repository;
mod session_validator;
mod subscription_repository;
mod usage_repository;

pub use account_repository::AccountRepository;
pub use billing_provider::{
    BillingError, BillingErrorCode, BillingProvider, CheckoutSession, CheckoutSessionRequest,
};
pub use credential_cipher::{CipherError, CredentialCipher};
pub use pending_registration_repository::PendingRegistrationRepository;
pub use profile_repository::ProfileRepository;
pub use session_validator::SessionValidator;
pub use subscription_repository::SubscriptionRepository;
pub use usage_repository::UsageRepository;
