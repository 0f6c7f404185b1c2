//! # Shared Types Crate
//!
//! Ledger entities used across the composition pipeline.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `Unit`, `Author`, `Message` and `Joint` are
//!   defined once here and serialized the same way by every crate.
//! - **Optional fields stay absent**: fields that a unit does not carry are
//!   omitted from its serialized form, so content hashes only cover what the
//!   unit actually declares.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;

/// Protocol version stamped on every composed unit.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Network alternative identifier.
pub const PROTOCOL_ALT: &str = "1";

/// Length in characters of a base64 encoded secp256k1 signature (64 bytes).
pub const SIG_LENGTH: usize = 88;

/// Proof-of-work type used by witness "trustme" units (genesis and recovery).
pub const POW_TYPE_TRUSTME: u8 = 2;

/// Payload location for messages carried inside the unit.
pub const PAYLOAD_LOCATION_INLINE: &str = "inline";
