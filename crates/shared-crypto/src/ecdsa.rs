//! # ECDSA Signatures (secp256k1)
//!
//! Author signatures are computed over a 32-byte digest (the unit's hash to
//! sign) and travel as base64 text inside authentifier maps.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization
//! - Constant-time operations

use crate::hashing::{decode_base64, encode_base64};
use crate::{CryptoError, Hash};
use k256::ecdsa::{
    signature::hazmat::{PrehashSigner, PrehashVerifier},
    Signature, SigningKey, VerifyingKey,
};
use zeroize::Zeroize;

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1PublicKey([u8; 33]);

impl Secp256k1PublicKey {
    /// Create from compressed bytes (33 bytes, starting with 0x02 or 0x03).
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Get raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Base64 form, as used inside address definitions (`["sig", {"pubkey": ..}]`).
    pub fn to_base64(&self) -> String {
        encode_base64(&self.0)
    }

    /// Verify a signature over a 32-byte digest.
    pub fn verify_digest(
        &self,
        digest: &Hash,
        signature: &Secp256k1Signature,
    ) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = Signature::from_slice(&signature.0).map_err(|_| CryptoError::InvalidSignatureFormat)?;

        verifying_key
            .verify_prehash(digest, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// ECDSA signature (64 bytes, r||s format).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1Signature([u8; 64]);

impl Secp256k1Signature {
    /// Create from bytes (64 bytes).
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Base64 text form (always 88 characters).
    pub fn to_base64(&self) -> String {
        encode_base64(&self.0)
    }

    /// Parse the base64 text form.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let bytes = decode_base64(text)?;
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        Ok(Self(bytes))
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Get public key (compressed, 33 bytes).
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let verifying_key = self.signing_key.verifying_key();
        let sec1_bytes = verifying_key.to_sec1_bytes();
        // SEC1 compressed keys are always 33 bytes
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1_bytes[..33]);
        Secp256k1PublicKey(bytes)
    }

    /// Sign a 32-byte digest (deterministic RFC 6979).
    pub fn sign_digest(&self, digest: &Hash) -> Result<Secp256k1Signature, CryptoError> {
        let sig: Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|_| CryptoError::SigningFailed)?;
        let sig = sig.normalize_s().unwrap_or(sig);
        let bytes: [u8; 64] = sig.to_bytes().into();
        Ok(Secp256k1Signature(bytes))
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}
