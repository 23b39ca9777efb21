//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid host or port")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Database acquire timeout must be between 1 and 15 seconds")]
    InvalidAcquireTimeout,

    #[error("JWT secret must be at least 32 bytes in production")]
    WeakJwtSecret,

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Invalid Stripe webhook secret format")]
    InvalidStripeWebhookSecret,

    #[error("Invalid Stripe price ID: {0}")]
    InvalidPriceId(&'static str),

    #[error("Checkout redirect URL must be absolute: {0}")]
    InvalidRedirectUrl(&'static str),

    #[error("Trial period must be between 1 and 30 days")]
    InvalidTrialPeriod,

    #[error("Registration TTL must be between 1 and 168 hours")]
    InvalidRegistrationTtl,

    #[error("Registration encryption key must be 32 bytes, base64-encoded")]
    InvalidEncryptionKey,

    #[error("Legacy plaintext credentials are not allowed in production")]
    LegacyCredentialsInProduction,

    #[error("Access path must start with '/': {0}")]
    InvalidAccessPath(&'static str),

    #[error("Sync must attempt the provider at least once")]
    InvalidSyncAttempts,
}
