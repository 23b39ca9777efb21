//! Credential cipher port - reversible encryption for passwords held in a
//! pending registration until the account is created.

use secrecy::SecretString;
use thiserror::Error;

/// Errors from the credential cipher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed: {0}")]
    Decrypt(String),
}

/// Encrypts and decrypts stored credentials.
pub trait CredentialCipher: Send + Sync {
    /// Returns a self-contained text encoding of the ciphertext.
    fn encrypt(&self, plaintext: &SecretString) -> Result<String, CipherError>;

    /// Reverses [`CredentialCipher::encrypt`].
    fn decrypt(&self, encoded: &str) -> Result<SecretString, CipherError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_cipher_is_object_safe() {
        fn _accepts_dyn(_cipher: &dyn CredentialCipher) {}
    }

    #[test]
    fn cipher_error_displays_reason() {
        assert_eq!(
            CipherError::Decrypt("tag mismatch".into()).to_string(),
            "Decryption failed: tag mismatch"
        );
    }
}
