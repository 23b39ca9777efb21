//! Registration configuration

use base64::Engine;
use secrecy::SecretString;
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

const ENCRYPTION_KEY_LEN: usize = 32;

/// Registration-through-checkout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// How long a pending registration waits for its payment
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,

    /// Base64-encoded AES-256 key for pending passwords
    pub encryption_key: String,

    /// Accept stored passwords that fail to decrypt as plaintext
    #[serde(default)]
    pub allow_legacy_plaintext_credentials: bool,
}

impl RegistrationConfig {
    pub fn encryption_key(&self) -> SecretString {
        SecretString::new(self.encryption_key.clone())
    }

    /// Validate registration configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.ttl_hours < 1 || self.ttl_hours > 168 {
            return Err(ValidationError::InvalidRegistrationTtl);
        }
        if self.encryption_key.is_empty() {
            return Err(ValidationError::MissingRequired(
                "REGISTRATION__ENCRYPTION_KEY",
            ));
        }
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(self.encryption_key.trim())
            .map_err(|_| ValidationError::InvalidEncryptionKey)?;
        if decoded.len() != ENCRYPTION_KEY_LEN {
            return Err(ValidationError::InvalidEncryptionKey);
        }
        if self.allow_legacy_plaintext_credentials && *environment == Environment::Production {
            return Err(ValidationError::LegacyCredentialsInProduction);
        }
        Ok(())
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            encryption_key: String::new(),
            allow_legacy_plaintext_credentials: false,
        }
    }
}

fn default_ttl_hours() -> i64 {
    24
}
