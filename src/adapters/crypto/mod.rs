//! Credential encryption adapters.

mod aes_credential_cipher;

pub use aes_credential_cipher::AesCredentialCipher;
