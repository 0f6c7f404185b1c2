//! # Unit Composer
//!
//! Client-side composition of multi-author DAG ledger units.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Pipeline
//!
//! ```text
//! request ─→ [light vendor fetch] ─→ AddressLockManager
//!         ─→ ledger transaction { ParentSelector → messages/payment → AuthorAssembler }
//!         ─→ commit ─→ SignatureCollector (parallel per path) ─→ UnitFinalizer
//!         ─→ if_ok(joint, private_payloads, lock)
//! ```
//!
//! | Stage | Module | Holds |
//! |-------|--------|-------|
//! | Address group locking | `algorithms::address_lock` | lock |
//! | Parent selection | `algorithms::parent_selector` | lock, connection |
//! | Author assembly | `algorithms::author_assembler` | lock, connection |
//! | Payment inputs | `algorithms::input_selector` | lock, connection |
//! | Signing | `algorithms::signature_collector` | lock |
//! | Hash, ball, timestamp | `algorithms::unit_finalizer` | lock |
//!
//! Every failure after locking rolls back the open transaction and releases
//! the lock before the error is reported.
//!
//! ## Module Structure
//!
//! ```text
//! unit-composer/
//! ├── domain/          # Errors, stage machine, disclosure decisions, invariants
//! ├── algorithms/      # Pipeline stages, hashes, message builders
//! ├── ports/           # UnitComposerApi (inbound) + ledger/signer/vendor traits (outbound)
//! ├── adapters/        # In-memory ledger, seed signer, key store, vendor, broadcast, callbacks
//! ├── application/     # UnitComposerService
//! └── config.rs        # ComposerConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    BroadcastCallbacks, CallbackOutcome, ChannelBroadcaster, ChannelCallbacks, InMemoryKeyStore,
    InMemoryLedger, QueryKind, SavingCallbacks, SeedPhraseSigner, StaticLightVendor, UnitRecord,
    WitnessConfig,
};
pub use algorithms::{
    ball_hash, hash_to_sign, lock_key, unit_hash, AddressLock, AddressLockManager,
};
pub use application::UnitComposerService;
pub use config::{ComposerConfig, NodeMode};
pub use domain::{
    ComposeError, CompositionKind, CompositionStage, CompositionTracker, DisclosureDecision,
    LedgerError, PrivatePayloads, SignerError, SigningPaths,
};
pub use ports::{
    ComposedUnit, CompositionCallbacks, CompositionRequest, JointBroadcaster, JointStore,
    KeyStore, LedgerStore, LedgerTransaction, LightVendor, MockSigner, SignOutcome, Signer,
    SignerHandle, SignerMetadata, UnitComposerApi,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
