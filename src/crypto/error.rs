// Opsvault: Crypto error types

use thiserror::Error;

/// Failure to open a sealed secret.
///
/// `Authentication` deliberately carries no detail: a wrong key, a flipped
/// bit and a forged blob all look the same to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("malformed ciphertext blob: {0}")]
    Format(String),

    #[error("ciphertext failed authentication")]
    Authentication,

    #[error("plaintext too large to seal")]
    TooLarge,
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Application secret must not be empty")]
    EmptySecret,

    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Application secret not found, run `opsvault init` first")]
    SecretNotFound,
}
