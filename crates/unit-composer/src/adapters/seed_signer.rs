//! # Seed-Phrase Signer
//!
//! Signs for witness addresses whose keys are derived from a mnemonic on
//! the wallet path `m/44'/0'/0'/{is_change}/{address_index}`. Each address
//! has a single-sig definition and one signing path `"r"`.
//!
//! Configuration is a JSON array of [`WitnessConfig`] entries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_crypto::{DerivationPath, ExtendedPrivateKey, Hash, Secp256k1KeyPair};
use shared_types::{Address, Definition, SIG_LENGTH};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::{SignerError, SigningPaths};
use crate::ports::{SignOutcome, Signer, SignerMetadata};

/// The only signing path of a single-sig definition.
pub const SINGLE_SIG_PATH: &str = "r";

/// Single-sig definition for a public key.
pub fn sig_definition(pubkey_base64: &str) -> Definition {
    serde_json::json!(["sig", {"pubkey": pubkey_base64}])
}

/// One configured witness identity.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WitnessConfig {
    /// Witness address.
    #[zeroize(skip)]
    pub address: Address,
    /// Expected definition; derived from the key when absent.
    #[serde(default)]
    #[zeroize(skip)]
    pub definition: Option<Definition>,
    /// BIP-39 phrase.
    pub mnemonic_phrase: String,
    /// BIP-39 passphrase.
    #[serde(default)]
    pub passphrase: String,
    /// Change branch of the wallet path.
    #[serde(default)]
    pub is_change: u32,
    /// Address index of the wallet path.
    pub address_index: u32,
}

impl fmt::Debug for WitnessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WitnessConfig")
            .field("address", &self.address)
            .field("is_change", &self.is_change)
            .field("address_index", &self.address_index)
            .finish_non_exhaustive()
    }
}

struct WitnessKey {
    key: Secp256k1KeyPair,
    definition: Definition,
}

/// Signer holding keys derived from seed phrases.
pub struct SeedPhraseSigner {
    keys: BTreeMap<Address, WitnessKey>,
}

impl SeedPhraseSigner {
    /// Derive keys for every configured witness.
    pub fn from_witnesses(witnesses: &[WitnessConfig]) -> Result<Self, SignerError> {
        let mut keys = BTreeMap::new();
        for witness in witnesses {
            let path = DerivationPath::wallet(0, witness.is_change, witness.address_index)?;
            let key = ExtendedPrivateKey::from_mnemonic(&witness.mnemonic_phrase, &witness.passphrase)?
                .derive_path(&path)?
                .to_key_pair()?;
            let pubkey = key.public_key().to_base64();
            let definition = match &witness.definition {
                Some(definition) => {
                    if let Some(configured) = definition_pubkey(definition) {
                        if configured != pubkey {
                            return Err(SignerError::KeyMismatch(witness.address.clone()));
                        }
                    }
                    definition.clone()
                }
                None => sig_definition(&pubkey),
            };
            tracing::debug!(
                address = %witness.address,
                path = %path,
                "[composer] Witness key derived"
            );
            keys.insert(witness.address.clone(), WitnessKey { key, definition });
        }
        Ok(Self { keys })
    }

    /// Parse a JSON array of witness entries.
    pub fn from_json(text: &str) -> Result<Self, SignerError> {
        let witnesses: Vec<WitnessConfig> =
            serde_json::from_str(text).map_err(|e| SignerError::Config(e.to_string()))?;
        Self::from_witnesses(&witnesses)
    }

    /// Load witness entries from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SignerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SignerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Addresses this signer controls.
    pub fn addresses(&self) -> Vec<Address> {
        self.keys.keys().cloned().collect()
    }

    /// Base64 public key of `address`.
    pub fn public_key(&self, address: &Address) -> Option<String> {
        self.keys.get(address).map(|k| k.key.public_key().to_base64())
    }

    fn witness(&self, address: &Address) -> Result<&WitnessKey, SignerError> {
        self.keys
            .get(address)
            .ok_or_else(|| SignerError::UnknownAddress(address.clone()))
    }
}

fn definition_pubkey(definition: &Value) -> Option<String> {
    match definition.as_array()?.as_slice() {
        [op, params] if op == "sig" => params.get("pubkey")?.as_str().map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl SignerMetadata for SeedPhraseSigner {
    async fn read_signing_paths(&self, address: &Address) -> Result<SigningPaths, SignerError> {
        self.witness(address)?;
        Ok([(SINGLE_SIG_PATH.to_string(), SIG_LENGTH)].into_iter().collect())
    }

    async fn read_definition(&self, address: &Address) -> Result<Definition, SignerError> {
        Ok(self.witness(address)?.definition.clone())
    }
}

#[async_trait]
impl Signer for SeedPhraseSigner {
    async fn sign(&self, hash: &Hash, address: &Address, path: &str) -> SignOutcome {
        let witness = match self.witness(address) {
            Ok(witness) => witness,
            Err(e) => return SignOutcome::Failed(e),
        };
        if path != SINGLE_SIG_PATH {
            return SignOutcome::Failed(SignerError::UnknownPath {
                address: address.clone(),
                path: path.to_string(),
            });
        }
        match witness.key.sign_digest(hash) {
            Ok(signature) => SignOutcome::Signed(signature.to_base64()),
            Err(e) => SignOutcome::Failed(e.into()),
        }
    }
}
