//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid signature format
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Signing failed
    #[error("Signing failed")]
    SigningFailed,

    /// Value could not be serialized for hashing
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Invalid base64 input
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    /// Malformed derivation path
    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    /// Derived key fell outside the curve order (BIP-32 says skip the index)
    #[error("Derived key is invalid at index {0}")]
    InvalidChildKey(u32),
}
