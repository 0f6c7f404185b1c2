//! # Seed-Phrase Key Derivation
//!
//! BIP-39 seed stretching (PBKDF2-HMAC-SHA512, 2048 rounds) followed by
//! BIP-32 hierarchical derivation on secp256k1.
//!
//! Phrases are whitespace-normalized but not NFKD-normalized, so only ASCII
//! word lists produce standard seeds.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use crate::{CryptoError, Secp256k1KeyPair};

type HmacSha512 = Hmac<Sha512>;

/// PBKDF2 iteration count fixed by BIP-39.
pub const BIP39_ROUNDS: u32 = 2048;

/// First index of the hardened range.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

const MASTER_KEY_DOMAIN: &[u8] = b"Bitcoin seed";

/// Stretch a mnemonic phrase into a 64-byte seed.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Zeroizing<[u8; 64]>, CryptoError> {
    let normalized = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
    let salt = Zeroizing::new(format!("mnemonic{passphrase}"));
    pbkdf2_hmac_sha512(normalized.as_bytes(), salt.as_bytes(), BIP39_ROUNDS)
}

/// PBKDF2 with HMAC-SHA512 producing exactly one 64-byte block.
fn pbkdf2_hmac_sha512(
    password: &[u8],
    salt: &[u8],
    rounds: u32,
) -> Result<Zeroizing<[u8; 64]>, CryptoError> {
    let prf = HmacSha512::new_from_slice(password)
        .map_err(|_| CryptoError::InvalidPrivateKey)?;

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut block = [0u8; 64];
    block.copy_from_slice(&mac.finalize().into_bytes());

    let mut out = Zeroizing::new(block);
    for _ in 1..rounds {
        let mut mac = prf.clone();
        mac.update(&block);
        block.copy_from_slice(&mac.finalize().into_bytes());
        for (o, b) in out.iter_mut().zip(block.iter()) {
            *o ^= b;
        }
    }
    block.zeroize();
    Ok(out)
}

// =============================================================================
// DERIVATION PATHS
// =============================================================================

/// One path component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildIndex(u32);

impl ChildIndex {
    /// Non-hardened index.
    pub fn normal(index: u32) -> Result<Self, CryptoError> {
        if index >= HARDENED_OFFSET {
            return Err(CryptoError::InvalidDerivationPath(format!(
                "index {index} out of range"
            )));
        }
        Ok(Self(index))
    }

    /// Hardened index (`index'`).
    pub fn hardened(index: u32) -> Result<Self, CryptoError> {
        Self::normal(index).map(|c| Self(c.0 | HARDENED_OFFSET))
    }

    /// Whether the index is in the hardened range.
    pub fn is_hardened(&self) -> bool {
        self.0 >= HARDENED_OFFSET
    }

    /// Raw 32-bit value as serialized into the HMAC input.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// A BIP-32 path such as `m/44'/0'/0'/0/3`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivationPath(Vec<ChildIndex>);

impl DerivationPath {
    /// BIP-44 style wallet path `m/44'/0'/{account}'/{is_change}/{address_index}`.
    pub fn wallet(account: u32, is_change: u32, address_index: u32) -> Result<Self, CryptoError> {
        Ok(Self(vec![
            ChildIndex::hardened(44)?,
            ChildIndex::hardened(0)?,
            ChildIndex::hardened(account)?,
            ChildIndex::normal(is_change)?,
            ChildIndex::normal(address_index)?,
        ]))
    }

    /// Path components, root first.
    pub fn components(&self) -> &[ChildIndex] {
        &self.0
    }
}

impl FromStr for DerivationPath {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        if parts.next() != Some("m") {
            return Err(CryptoError::InvalidDerivationPath(s.to_string()));
        }
        parts
            .map(|part| {
                let (digits, hardened) = match part.strip_suffix('\'') {
                    Some(d) => (d, true),
                    None => (part, false),
                };
                let index: u32 = digits
                    .parse()
                    .map_err(|_| CryptoError::InvalidDerivationPath(s.to_string()))?;
                if hardened {
                    ChildIndex::hardened(index)
                } else {
                    ChildIndex::normal(index)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for child in &self.0 {
            if child.is_hardened() {
                write!(f, "/{}'", child.0 - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{}", child.0)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// EXTENDED KEYS
// =============================================================================

/// BIP-32 extended private key.
pub struct ExtendedPrivateKey {
    key: Zeroizing<[u8; 32]>,
    chain_code: Zeroizing<[u8; 32]>,
}

impl ExtendedPrivateKey {
    /// Master key from a seed.
    pub fn master(seed: &[u8]) -> Result<Self, CryptoError> {
        let mut mac = HmacSha512::new_from_slice(MASTER_KEY_DOMAIN)
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        mac.update(seed);
        let output = mac.finalize().into_bytes();
        Self::split(&output[..], None, 0)
    }

    /// Master key straight from a mnemonic phrase.
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, CryptoError> {
        let seed = mnemonic_to_seed(phrase, passphrase)?;
        Self::master(seed.as_slice())
    }

    /// Derive one child.
    pub fn derive_child(&self, child: ChildIndex) -> Result<Self, CryptoError> {
        let mut mac = HmacSha512::new_from_slice(self.chain_code.as_slice())
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        if child.is_hardened() {
            mac.update(&[0u8]);
            mac.update(self.key.as_slice());
        } else {
            let public = self.to_key_pair()?.public_key();
            mac.update(public.as_bytes());
        }
        mac.update(&child.raw().to_be_bytes());
        let parent = scalar_from_bytes(&self.key).ok_or(CryptoError::InvalidPrivateKey)?;
        let output = mac.finalize().into_bytes();
        Self::split(&output[..], Some(parent), child.raw())
    }

    /// Derive along a full path from this key.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, CryptoError> {
        let mut current = Self {
            key: self.key.clone(),
            chain_code: self.chain_code.clone(),
        };
        for child in path.components() {
            current = current.derive_child(*child)?;
        }
        Ok(current)
    }

    /// The signing keypair for this node.
    pub fn to_key_pair(&self) -> Result<Secp256k1KeyPair, CryptoError> {
        Secp256k1KeyPair::from_bytes(*self.key)
    }

    /// Secret key bytes.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Chain code bytes.
    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// Split an HMAC output into key (IL, tweaked by `parent`) and chain code (IR).
    fn split(output: &[u8], parent: Option<Scalar>, index: u32) -> Result<Self, CryptoError> {
        let mut il = Zeroizing::new([0u8; 32]);
        il.copy_from_slice(&output[..32]);
        let mut chain_code = Zeroizing::new([0u8; 32]);
        chain_code.copy_from_slice(&output[32..64]);

        let tweak = scalar_from_bytes(&il).ok_or(CryptoError::InvalidChildKey(index))?;
        let key = match parent {
            Some(parent) => tweak + parent,
            None => tweak,
        };
        if bool::from(key.is_zero()) {
            return Err(CryptoError::InvalidChildKey(index));
        }

        let bytes: [u8; 32] = key.to_bytes().into();
        Ok(Self {
            key: Zeroizing::new(bytes),
            chain_code,
        })
    }
}

/// Parse 32 big-endian bytes as a scalar; `None` when not below the curve order.
fn scalar_from_bytes(bytes: &[u8; 32]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::from(*bytes)))
}
