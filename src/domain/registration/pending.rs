//! Pending registration: the single-use bridge between "checkout started"
//! and "account exists" for users who do not have an account yet.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Timestamp, UserId, ValidationError};

/// Opaque token carried through checkout metadata. 32 random bytes, hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationToken(String);

impl RegistrationToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("registration_token"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored credentials waiting for payment to complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    pub token: RegistrationToken,
    /// Id the account is created with. An existing account belongs to this
    /// registration only if it carries this id.
    pub user_id: UserId,
    /// Normalized (lowercase) email.
    pub email: String,
    /// `base64(nonce || ciphertext)` produced by the credential cipher.
    pub password_encrypted: String,
    pub phone_verification_id: Option<String>,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

impl PendingRegistration {
    pub fn new(
        token: RegistrationToken,
        email: impl Into<String>,
        password_encrypted: impl Into<String>,
        phone_verification_id: Option<String>,
        ttl_hours: i64,
        now: Timestamp,
    ) -> Self {
        Self {
            token,
            user_id: UserId::from_uuid(uuid::Uuid::new_v4()),
            email: email.into(),
            password_encrypted: password_encrypted.into(),
            phone_verification_id,
            expires_at: now.add_hours(ttl_hours),
            created_at: now,
        }
    }

    /// Expired once `expires_at` is reached.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        !self.expires_at.is_after(now)
    }
}

/// A phone check the registration flow relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneVerification {
    pub id: String,
    pub verified_at: Option<Timestamp>,
    pub consumed_at: Option<Timestamp>,
}

impl PhoneVerification {
    /// Verified and not yet used by a completed registration.
    pub fn is_usable(&self) -> bool {
        self.verified_at.is_some() && self.consumed_at.is_none()
    }
}
