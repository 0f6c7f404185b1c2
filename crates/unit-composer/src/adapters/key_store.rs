//! Raw-key store for the composer-signs mode.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Address, Definition, SIG_LENGTH};
use std::collections::HashMap;
use zeroize::Zeroizing;

use super::seed_signer::{sig_definition, SINGLE_SIG_PATH};
use crate::domain::{SignerError, SigningPaths};
use crate::ports::{KeyStore, SignerMetadata};

struct StoredKey {
    secret: Zeroizing<[u8; 32]>,
    definition: Definition,
}

/// Single-sig secrets kept in memory, handed to the composer on request.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<Address, StoredKey>>,
}

impl InMemoryKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `secret` for `address`; returns its single-sig definition.
    pub fn insert(&self, address: Address, secret: [u8; 32]) -> Result<Definition, SignerError> {
        let secret = Zeroizing::new(secret);
        let pubkey = Secp256k1KeyPair::from_bytes(*secret)?.public_key().to_base64();
        let definition = sig_definition(&pubkey);
        self.keys.write().insert(
            address,
            StoredKey {
                secret,
                definition: definition.clone(),
            },
        );
        Ok(definition)
    }

    /// Store a fresh random key for `address`.
    pub fn generate(&self, address: Address) -> Result<Definition, SignerError> {
        let key = Secp256k1KeyPair::generate();
        self.insert(address, key.to_bytes())
    }

    /// Whether `address` has a key.
    pub fn contains(&self, address: &Address) -> bool {
        self.keys.read().contains_key(address)
    }
}

#[async_trait]
impl SignerMetadata for InMemoryKeyStore {
    async fn read_signing_paths(&self, address: &Address) -> Result<SigningPaths, SignerError> {
        if !self.contains(address) {
            return Err(SignerError::UnknownAddress(address.clone()));
        }
        Ok([(SINGLE_SIG_PATH.to_string(), SIG_LENGTH)].into_iter().collect())
    }

    async fn read_definition(&self, address: &Address) -> Result<Definition, SignerError> {
        self.keys
            .read()
            .get(address)
            .map(|k| k.definition.clone())
            .ok_or_else(|| SignerError::UnknownAddress(address.clone()))
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn read_private_key(
        &self,
        address: &Address,
        path: &str,
    ) -> Result<Secp256k1KeyPair, SignerError> {
        if path != SINGLE_SIG_PATH {
            return Err(SignerError::UnknownPath {
                address: address.clone(),
                path: path.to_string(),
            });
        }
        let keys = self.keys.read();
        let stored = keys
            .get(address)
            .ok_or_else(|| SignerError::UnknownAddress(address.clone()))?;
        Ok(Secp256k1KeyPair::from_bytes(*stored.secret)?)
    }
}
