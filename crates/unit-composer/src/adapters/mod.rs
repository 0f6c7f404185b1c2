//! # Adapters
//!
//! Implementations of the outbound ports and callback decorators.

pub mod broadcast;
pub mod callbacks;
pub mod key_store;
pub mod light_vendor;
pub mod memory_ledger;
pub mod seed_signer;

pub use broadcast::ChannelBroadcaster;
pub use callbacks::{BroadcastCallbacks, CallbackOutcome, ChannelCallbacks, SavingCallbacks};
pub use key_store::InMemoryKeyStore;
pub use light_vendor::StaticLightVendor;
pub use memory_ledger::{InMemoryLedger, LedgerStats, QueryKind, Sequence, UnitAuthor, UnitRecord};
pub use seed_signer::{sig_definition, SeedPhraseSigner, WitnessConfig};
