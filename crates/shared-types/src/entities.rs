//! # Core Ledger Entities
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `SigningPath`, `Definition`
//! - **Unit content**: `Unit`, `Author`, `Message`, `Output`, `Input`
//! - **Envelope**: `Joint`
//! - **DAG references**: `ParentProps`

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AddressError;

/// Number of characters in an address.
pub const ADDRESS_LENGTH: usize = 32;

/// Key of one authorization slot within an address definition (e.g. `"r"`,
/// `"r.0.1"` for a multisig branch).
pub type SigningPath = String;

/// Address definition as disclosed on the ledger (an opaque JSON expression).
pub type Definition = serde_json::Value;

/// Authentifier map of an author, keyed by signing path.
pub type Authentifiers = BTreeMap<SigningPath, String>;

// =============================================================================
// ADDRESS
// =============================================================================

/// A ledger address: 32 characters of the RFC 4648 base32 alphabet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and validate an address.
    pub fn parse(value: impl Into<String>) -> Result<Self, AddressError> {
        let value = value.into();
        if value.len() != ADDRESS_LENGTH {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_LENGTH,
                actual: value.len(),
            });
        }
        if let Some((position, character)) = value
            .chars()
            .enumerate()
            .find(|(_, c)| !matches!(c, 'A'..='Z' | '2'..='7'))
        {
            return Err(AddressError::InvalidCharacter {
                character,
                position,
            });
        }
        Ok(Self(value))
    }

    /// Borrow the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// UNIT CONTENT
// =============================================================================

/// One author of a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Authoring address.
    pub address: Address,
    /// Definition, present only when this unit has to disclose it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<Definition>,
    /// Signature (or placeholder) per signing path.
    pub authentifiers: Authentifiers,
}

impl Author {
    /// Author with no definition and no authentifiers yet.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            definition: None,
            authentifiers: Authentifiers::new(),
        }
    }
}

/// One data element attached to a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Application kind (`payment`, `data_feed`, `text`, ...).
    pub app: String,
    /// Where the payload lives; always `inline` for composed units.
    pub payload_location: String,
    /// Base64 object hash of `payload`.
    pub payload_hash: String,
    /// The payload itself.
    pub payload: serde_json::Value,
}

/// A payment output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Output {
    /// Receiving address.
    pub address: Address,
    /// Amount in base units.
    pub amount: u64,
}

/// Reference to a previously created output being spent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Input {
    /// Unit that created the output.
    pub unit: String,
    /// Index of the payment message inside that unit.
    pub message_index: u32,
    /// Index of the output inside that message.
    pub output_index: u32,
}

/// A ledger unit as assembled by the composer.
///
/// `unit` (the content hash) is assigned last; once it is set the unit is
/// treated as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Protocol version.
    pub version: String,
    /// Network alternative.
    pub alt: String,
    /// Parent unit hashes (absent for genesis).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_units: Option<Vec<String>>,
    /// Last stable main-chain ball.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ball: Option<String>,
    /// Unit carrying `last_ball`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ball_unit: Option<String>,
    /// Attached messages, in order.
    pub messages: Vec<Message>,
    /// Authors, ordered by address.
    pub authors: Vec<Author>,
    /// Consensus round the unit belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_index: Option<u64>,
    /// Proof-of-work type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pow_type: Option<u8>,
    /// Height of the unit on the main chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<u64>,
    /// Round phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<u32>,
    /// Content hash (unit identifier).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Wall-clock seconds, stamped after the content hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl Unit {
    /// Empty unit for the given protocol version and alt.
    pub fn new(version: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            alt: alt.into(),
            parent_units: None,
            last_ball: None,
            last_ball_unit: None,
            messages: Vec::new(),
            authors: Vec::new(),
            round_index: None,
            pow_type: None,
            hp: None,
            phase: None,
            unit: None,
            timestamp: None,
        }
    }

    /// Author record for `address`, if present.
    pub fn author(&self, address: &Address) -> Option<&Author> {
        self.authors.iter().find(|a| &a.address == address)
    }

    /// Mutable author record for `address`, if present.
    pub fn author_mut(&mut self, address: &Address) -> Option<&mut Author> {
        self.authors.iter_mut().find(|a| &a.address == address)
    }

    /// Whether the content hash has been assigned.
    pub fn is_finalized(&self) -> bool {
        self.unit.is_some()
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::new(crate::PROTOCOL_VERSION, crate::PROTOCOL_ALT)
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// The broadcastable envelope around a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// The finalized unit.
    pub unit: Unit,
    /// Ball hash; only set for genesis and recovery units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ball: Option<String>,
}

impl Joint {
    /// Content hash of the wrapped unit.
    pub fn unit_hash(&self) -> Option<&str> {
        self.unit.unit.as_deref()
    }
}

// =============================================================================
// DAG REFERENCES
// =============================================================================

/// Parent and last-stable-ball references a new unit is built on.
///
/// Field names follow the light vendor response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentProps {
    /// Free units to reference as parents.
    pub parent_units: Vec<String>,
    /// Ball of the last stable main-chain unit.
    pub last_stable_mc_ball: String,
    /// The last stable main-chain unit.
    pub last_stable_mc_ball_unit: String,
    /// Main-chain index of that unit.
    pub last_stable_mc_ball_mci: u64,
    /// Current consensus round.
    pub round_index: u64,
}
