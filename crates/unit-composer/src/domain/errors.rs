//! # Domain Errors
//!
//! Error types for unit composition.
//!
//! | Error | Retry? | Lock released before report |
//! |-------|--------|-----------------------------|
//! | `LockTimeout` | yes | nothing was held |
//! | `InvalidParentData` | caller may re-invoke | nothing was held |
//! | `UnstablePredecessor` | later | yes |
//! | `NotEnoughFunds` | after top-up | yes |
//! | `SignerRefused` / `SignerError` | no | yes |
//! | `TransactionError` | no | yes |

use shared_crypto::CryptoError;
use shared_types::Address;
use thiserror::Error;

/// Result alias for composition operations.
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Failures of the ledger snapshot surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// No connection could be taken from the pool.
    #[error("Connection pool unavailable: {0}")]
    PoolUnavailable(String),

    /// A read inside the transaction failed.
    #[error("Query failed ({query}): {message}")]
    Query {
        /// Which query failed
        query: String,
        /// Backend message
        message: String,
    },

    /// Commit failed.
    #[error("Commit failed: {0}")]
    Commit(String),

    /// Rollback failed.
    #[error("Rollback failed: {0}")]
    Rollback(String),

    /// Writing a joint failed.
    #[error("Failed to save joint: {0}")]
    Save(String),
}

/// Failures reported by a signing backend.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The signer holds no key material for this address.
    #[error("No signing identity for address {0}")]
    UnknownAddress(Address),

    /// The address has no such signing path.
    #[error("Unknown signing path {path} for address {address}")]
    UnknownPath {
        /// Address being signed for
        address: Address,
        /// Requested path
        path: String,
    },

    /// The signer reported an empty path set.
    #[error("Signer reported no signing paths for address {0}")]
    NoSigningPaths(Address),

    /// A signing path declared a zero-length signature slot.
    #[error("Signing path {path} of {address} declares an empty signature")]
    EmptySignaturePath {
        /// Address that reported the path
        address: Address,
        /// Offending path
        path: String,
    },

    /// Signature length differs from the declared slot length.
    #[error("Signature for {address}/{path} is {actual} chars, expected {expected}")]
    SignatureLength {
        /// Address being signed for
        address: Address,
        /// Signing path
        path: String,
        /// Declared length
        expected: usize,
        /// Produced length
        actual: usize,
    },

    /// Derived key does not match the configured definition.
    #[error("Key derived for {0} does not match its definition")]
    KeyMismatch(Address),

    /// Key derivation or signing failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Signer configuration could not be loaded.
    #[error("Invalid signer configuration: {0}")]
    Config(String),

    /// Opaque backend failure (remote cosigner, device, ...).
    #[error("Signing backend failed: {0}")]
    Backend(String),
}

/// Composition error taxonomy.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Address locks could not be acquired in time.
    #[error("Timed out after {waited_ms}ms waiting for address locks {addresses:?}")]
    LockTimeout {
        /// Requested address set
        addresses: Vec<Address>,
        /// Time waited
        waited_ms: u64,
    },

    /// Light vendor response is missing a field or has a wrong type.
    #[error("Invalid parent data: {0}")]
    InvalidParentData(String),

    /// Some definition changes, definitions or nonserials are not stable yet.
    #[error("Some definition changes or definitions or nonserials are not stable yet")]
    UnstablePredecessor,

    /// Stable spendable outputs do not cover the requested amount.
    #[error("Not enough spendable funds: required {required}, available {available}")]
    NotEnoughFunds {
        /// Sum of requested outputs
        required: u64,
        /// Sum of spendable outputs
        available: u64,
    },

    /// One of the cosigners declined to sign.
    #[error("One of the cosigners refused to sign ({address}/{path})")]
    SignerRefused {
        /// Address whose path was refused
        address: Address,
        /// Refused path
        path: String,
    },

    /// Signing backend failure, surfaced verbatim.
    #[error(transparent)]
    SignerError(#[from] SignerError),

    /// Snapshot query, commit or rollback failed.
    #[error("Transaction error: {0}")]
    TransactionError(#[from] LedgerError),

    /// Request named no paying addresses.
    #[error("No paying addresses")]
    NoPayingAddresses,

    /// A message payload is not valid for its app.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The light vendor itself reported an error.
    #[error("Light vendor error: {0}")]
    Vendor(String),

    /// Broken internal invariant. Never routed to error callbacks.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ComposeError {
    /// Whether a fresh composition call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ComposeError::LockTimeout { .. }
                | ComposeError::UnstablePredecessor
                | ComposeError::NotEnoughFunds { .. }
        )
    }

    /// Whether this error must be re-raised instead of reported.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ComposeError::Internal(_))
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ComposeError::LockTimeout { .. } => "LOCK_TIMEOUT",
            ComposeError::InvalidParentData(_) => "INVALID_PARENT_DATA",
            ComposeError::UnstablePredecessor => "UNSTABLE_PREDECESSOR",
            ComposeError::NotEnoughFunds { .. } => "NOT_ENOUGH_FUNDS",
            ComposeError::SignerRefused { .. } => "SIGNER_REFUSED",
            ComposeError::SignerError(_) => "SIGNER_ERROR",
            ComposeError::TransactionError(_) => "TRANSACTION_ERROR",
            ComposeError::NoPayingAddresses => "NO_PAYING_ADDRESSES",
            ComposeError::InvalidMessage(_) => "INVALID_MESSAGE",
            ComposeError::Vendor(_) => "VENDOR_ERROR",
            ComposeError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<CryptoError> for ComposeError {
    fn from(err: CryptoError) -> Self {
        ComposeError::Internal(format!("hashing failed: {err}"))
    }
}
