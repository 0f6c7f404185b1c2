//! # Shared Crypto - Ledger Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 over canonical JSON | Unit, ball and payload hashes |
//! | `ecdsa` | secp256k1 | Author signatures over a 32-byte digest |
//! | `key_derivation` | BIP-39 seed, BIP-32 derivation | Seed-phrase signers |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, low-S normalization
//! - **Canonical hashing**: object keys sorted at every depth, so hashes do
//!   not depend on field declaration order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod key_derivation;

// Re-exports
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
pub use errors::CryptoError;
pub use hashing::{base64_hash, canonical_json, object_hash, sha256, Hash};
pub use key_derivation::{mnemonic_to_seed, DerivationPath, ExtendedPrivateKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
