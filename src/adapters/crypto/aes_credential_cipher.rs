//! AES-256-GCM credential cipher.
//!
//! Format: base64(nonce_12bytes || ciphertext || tag_16bytes)

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::ports::{CipherError, CredentialCipher};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Encrypts pending-registration passwords with a 32-byte key.
#[derive(Clone)]
pub struct AesCredentialCipher {
    key: [u8; KEY_LEN],
}

impl Drop for AesCredentialCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl AesCredentialCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Builds the cipher from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &SecretString) -> Result<Self, CipherError> {
        let mut bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.expose_secret().trim())
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;

        if bytes.len() != KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            return Err(CipherError::InvalidKey(format!(
                "wrong length: {} (expected {KEY_LEN})",
                len
            )));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self { key })
    }

    fn cipher(&self) -> Result<Aes256Gcm, CipherError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| CipherError::InvalidKey(e.to_string()))
    }
}

impl CredentialCipher for AesCredentialCipher {
    fn encrypt(&self, plaintext: &SecretString) -> Result<String, CipherError> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.expose_secret().as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&result))
    }

    fn decrypt(&self, encoded: &str) -> Result<SecretString, CipherError> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| CipherError::Decrypt("invalid base64".into()))?;

        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Decrypt("ciphertext too short".into()));
        }

        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
        let mut plaintext = cipher
            .decrypt(nonce, &data[NONCE_LEN..])
            .map_err(|_| CipherError::Decrypt("wrong key or tampered data".into()))?;

        let result = String::from_utf8(plaintext.clone())
            .map_err(|_| CipherError::Decrypt("plaintext is not UTF-8".into()));
        plaintext.zeroize();
        result.map(SecretString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> AesCredentialCipher {
        AesCredentialCipher::new([7u8; KEY_LEN])
    }

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn decrypt_reverses_encrypt() {
        let c = cipher();
        let encoded = c.encrypt(&secret("Motdepasse!123")).unwrap();

        assert_ne!(encoded, "Motdepasse!123");
        assert_eq!(c.decrypt(&encoded).unwrap().expose_secret(), "Motdepasse!123");
    }

    #[test]
    fn nonces_differ_between_encryptions() {
        let c = cipher();
        let a = c.encrypt(&secret("same")).unwrap();
        let b = c.encrypt(&secret("same")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let encoded = cipher().encrypt(&secret("pw")).unwrap();
        let other = AesCredentialCipher::new([8u8; KEY_LEN]);
        assert!(matches!(other.decrypt(&encoded), Err(CipherError::Decrypt(_))));
    }

    #[test]
    fn plaintext_input_is_rejected() {
        assert!(matches!(
            cipher().decrypt("not-encrypted-password"),
            Err(CipherError::Decrypt(_))
        ));
        assert!(matches!(cipher().decrypt("c2hvcnQ="), Err(CipherError::Decrypt(_))));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let c = cipher();
        let encoded = c.encrypt(&secret("pw")).unwrap();
        let mut bytes = base64::engine::general_purpose::STANDARD.decode(&encoded).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = base64::engine::general_purpose::STANDARD.encode(&bytes);

        assert!(c.decrypt(&tampered).is_err());
    }

    #[test]
    fn from_base64_checks_key_length() {
        let good = base64::engine::general_purpose::STANDARD.encode([1u8; KEY_LEN]);
        assert!(AesCredentialCipher::from_base64(&secret(&good)).is_ok());

        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(matches!(
            AesCredentialCipher::from_base64(&secret(&short)),
            Err(CipherError::InvalidKey(_))
        ));
        assert!(AesCredentialCipher::from_base64(&secret("%%%")).is_err());
    }
}
