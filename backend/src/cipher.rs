use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct CipherError {
    pub operation: &'static str,
    pub message: String,
}

impl CipherError {
    pub fn encrypt(message: impl Into<String>) -> Self {
        Self {
            operation: "encrypt",
            message: message.into(),
        }
    }

    pub fn decrypt(message: impl Into<String>) -> Self {
        Self {
            operation: "decrypt",
            message: message.into(),
        }
    }
}

/// Reversible cipher used for datasource passwords.
///
/// Only ciphertext is stored locally. Plaintext leaves the core in two places: an
/// ADMIN-level projection and the property map sent to the controller service.
pub trait TextCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;
}
