//! # Outbound Ports
//!
//! Collaborators the composer calls: the transactional ledger snapshot,
//! signers, the light vendor, broadcast and joint persistence.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared_crypto::{sha256, Hash, Secp256k1KeyPair};
use shared_types::{Address, Definition, Joint, ParentProps, SigningPath};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{DefinitionChange, LedgerError, SignerError, SigningPaths, SpendableOutput};

// =============================================================================
// LEDGER SNAPSHOT
// =============================================================================

/// Source of ledger transactions (a connection pool).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Take a connection from the pool and open a transaction on it.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, LedgerError>;
}

/// One open transaction. Dropping it returns the connection to the pool.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Free units and the last stable main-chain ball, for full nodes.
    async fn read_parent_props(&mut self) -> Result<ParentProps, LedgerError>;

    /// Whether any of `addresses` has a definition, definition change or
    /// non-good unit above `last_ball_mci` (or not yet on the main chain).
    async fn has_unstable_predecessors(
        &mut self,
        addresses: &[Address],
        last_ball_mci: u64,
    ) -> Result<bool, LedgerError>;

    /// Whether `address` authored a stable good unit at or below `max_mci`.
    async fn has_stable_good_unit(
        &mut self,
        address: &Address,
        max_mci: u64,
    ) -> Result<bool, LedgerError>;

    /// Most recent stable good definition change at or below `max_mci`.
    async fn latest_stable_definition_change(
        &mut self,
        address: &Address,
        max_mci: u64,
    ) -> Result<Option<DefinitionChange>, LedgerError>;

    /// Stable, unspent, good outputs owned by `addresses` at or below `max_mci`.
    async fn read_spendable_outputs(
        &mut self,
        addresses: &[Address],
        max_mci: u64,
    ) -> Result<Vec<SpendableOutput>, LedgerError>;

    /// Commit and return the connection.
    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    /// Roll back and return the connection.
    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Local persistence of finished joints.
#[async_trait]
pub trait JointStore: Send + Sync {
    /// Save a joint composed by this node.
    async fn save_joint(&self, joint: &Joint) -> Result<(), LedgerError>;
}

/// Fire-and-forget publication to peers.
pub trait JointBroadcaster: Send + Sync {
    /// Publish without waiting for confirmation.
    fn broadcast_joint(&self, joint: &Joint);
}

// =============================================================================
// LIGHT VENDOR
// =============================================================================

/// Remote full node answering requests for light clients.
#[async_trait]
pub trait LightVendor: Send + Sync {
    /// Send `method` with `params`; `Err` carries the vendor's error text.
    async fn request(&self, method: &str, params: Value) -> Result<Value, String>;
}

// =============================================================================
// SIGNERS
// =============================================================================

/// Result of one signing request.
#[derive(Debug)]
pub enum SignOutcome {
    /// Base64 signature.
    Signed(String),
    /// The cosigner declined.
    Refused,
    /// Backend failure.
    Failed(SignerError),
}

/// Signing-path metadata and definitions of the addresses a signer controls.
#[async_trait]
pub trait SignerMetadata: Send + Sync {
    /// Signing paths of `address` with expected signature lengths.
    async fn read_signing_paths(&self, address: &Address) -> Result<SigningPaths, SignerError>;

    /// Full definition of `address`.
    async fn read_definition(&self, address: &Address) -> Result<Definition, SignerError>;
}

/// A signer that produces signatures itself (local keys, remote cosigners).
#[async_trait]
pub trait Signer: SignerMetadata {
    /// Sign the unit's hash-to-sign for one path of one address.
    async fn sign(&self, hash: &Hash, address: &Address, path: &str) -> SignOutcome;
}

/// A signer that hands out raw keys; the composer signs.
#[async_trait]
pub trait KeyStore: SignerMetadata {
    /// Private key for one path of one address.
    async fn read_private_key(
        &self,
        address: &Address,
        path: &str,
    ) -> Result<Secp256k1KeyPair, SignerError>;
}

/// Signing capability chosen when the request is built.
#[derive(Clone)]
pub enum SignerHandle {
    /// Signer signs.
    Delegated(Arc<dyn Signer>),
    /// Composer signs with keys read from the store.
    RawKey(Arc<dyn KeyStore>),
}

impl SignerHandle {
    /// Signing paths of `address`.
    pub async fn read_signing_paths(&self, address: &Address) -> Result<SigningPaths, SignerError> {
        match self {
            SignerHandle::Delegated(signer) => signer.read_signing_paths(address).await,
            SignerHandle::RawKey(store) => store.read_signing_paths(address).await,
        }
    }

    /// Definition of `address`.
    pub async fn read_definition(&self, address: &Address) -> Result<Definition, SignerError> {
        match self {
            SignerHandle::Delegated(signer) => signer.read_definition(address).await,
            SignerHandle::RawKey(store) => store.read_definition(address).await,
        }
    }

    /// Sign `hash` for one path, whichever variant this is.
    pub async fn sign(&self, hash: &Hash, address: &Address, path: &str) -> SignOutcome {
        match self {
            SignerHandle::Delegated(signer) => signer.sign(hash, address, path).await,
            SignerHandle::RawKey(store) => match store.read_private_key(address, path).await {
                Ok(key) => match key.sign_digest(hash) {
                    Ok(signature) => SignOutcome::Signed(signature.to_base64()),
                    Err(e) => SignOutcome::Failed(e.into()),
                },
                Err(e) => SignOutcome::Failed(e),
            },
        }
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock signer with scripted refusals, failures and latency.
///
/// Signatures are 88-char base64 strings derived from the hash, address and
/// path, so they are deterministic but not verifiable.
#[derive(Default)]
pub struct MockSigner {
    paths: BTreeMap<Address, SigningPaths>,
    definitions: BTreeMap<Address, Definition>,
    refuse: HashSet<(Address, SigningPath)>,
    fail: HashSet<(Address, SigningPath)>,
    delay: Option<Duration>,
    sign_calls: AtomicUsize,
    definition_reads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    log: Mutex<Vec<(Address, SigningPath)>>,
}

impl MockSigner {
    /// Empty signer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Control `address` with one path `"r"` of 88 chars.
    pub fn with_address(self, address: Address) -> Self {
        let paths = [("r".to_string(), shared_types::SIG_LENGTH)]
            .into_iter()
            .collect();
        self.with_paths(address, paths)
    }

    /// Control `address` with explicit paths.
    pub fn with_paths(mut self, address: Address, paths: SigningPaths) -> Self {
        let definition = serde_json::json!(["sig", {"pubkey": format!("mock-{}", address)}]);
        self.definitions.insert(address.clone(), definition);
        self.paths.insert(address, paths);
        self
    }

    /// Refuse to sign this path.
    pub fn refusing(mut self, address: Address, path: &str) -> Self {
        self.refuse.insert((address, path.to_string()));
        self
    }

    /// Fail with a backend error on this path.
    pub fn failing(mut self, address: Address, path: &str) -> Self {
        self.fail.insert((address, path.to_string()));
        self
    }

    /// Sleep before answering each sign request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `sign` calls received.
    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    /// Number of `read_definition` calls received.
    pub fn definition_reads(&self) -> usize {
        self.definition_reads.load(Ordering::SeqCst)
    }

    /// Highest number of sign calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every (address, path) signed, in call order.
    pub fn signed_paths(&self) -> Vec<(Address, SigningPath)> {
        self.log.lock().clone()
    }

    /// The deterministic signature this mock produces.
    pub fn signature_for(hash: &Hash, address: &Address, path: &str) -> String {
        let first = sha256(&[hash.as_slice(), address.as_str().as_bytes(), path.as_bytes()].concat());
        let second = sha256(&first);
        shared_crypto::hashing::encode_base64(&[first, second].concat())
    }
}

#[async_trait]
impl SignerMetadata for MockSigner {
    async fn read_signing_paths(&self, address: &Address) -> Result<SigningPaths, SignerError> {
        self.paths
            .get(address)
            .cloned()
            .ok_or_else(|| SignerError::UnknownAddress(address.clone()))
    }

    async fn read_definition(&self, address: &Address) -> Result<Definition, SignerError> {
        self.definition_reads.fetch_add(1, Ordering::SeqCst);
        self.definitions
            .get(address)
            .cloned()
            .ok_or_else(|| SignerError::UnknownAddress(address.clone()))
    }
}

#[async_trait]
impl Signer for MockSigner {
    async fn sign(&self, hash: &Hash, address: &Address, path: &str) -> SignOutcome {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key = (address.clone(), path.to_string());
        if self.refuse.contains(&key) {
            return SignOutcome::Refused;
        }
        if self.fail.contains(&key) {
            return SignOutcome::Failed(SignerError::Backend(format!(
                "mock failure on {}/{}",
                address, path
            )));
        }
        self.log.lock().push(key);
        SignOutcome::Signed(Self::signature_for(hash, address, path))
    }
}
