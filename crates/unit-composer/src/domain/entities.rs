//! # Domain Entities
//!
//! Snapshot rows and composition options.

use serde::{Deserialize, Serialize};
use shared_types::{Address, Definition, Input};
use std::collections::BTreeMap;

/// Private payloads handed to `if_ok`, keyed by payload hash.
///
/// Composed units carry only inline payloads, so this is always empty.
pub type PrivatePayloads = BTreeMap<String, serde_json::Value>;

/// What kind of unit is being composed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionKind {
    /// Ordinary unit built on current parents.
    #[default]
    Regular,
    /// Witness recovery unit: round fields stamped, ball attached.
    Recovery,
    /// First unit of the DAG: no parents, no predecessor check.
    Genesis,
}

impl CompositionKind {
    /// Whether the joint carries a ball hash.
    pub fn attaches_ball(&self) -> bool {
        matches!(self, CompositionKind::Recovery | CompositionKind::Genesis)
    }

    /// Whether parent selection and the predecessor check run.
    pub fn selects_parents(&self) -> bool {
        !matches!(self, CompositionKind::Genesis)
    }

    /// Label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionKind::Regular => "regular",
            CompositionKind::Recovery => "recovery",
            CompositionKind::Genesis => "genesis",
        }
    }
}

/// Latest stable definition change of an address.
#[derive(Clone, Debug, PartialEq)]
pub struct DefinitionChange {
    /// Unit that carried the change.
    pub unit: String,
    /// Checksum of the new definition.
    pub definition_chash: String,
    /// The definition itself, if it is already persisted.
    pub definition: Option<Definition>,
}

impl DefinitionChange {
    /// Whether the target definition is already known to the ledger.
    pub fn is_persisted(&self) -> bool {
        self.definition.is_some()
    }
}

/// A stable, unspent output that can fund a payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendableOutput {
    /// Where the output lives.
    pub input: Input,
    /// Owner.
    pub address: Address,
    /// Amount in base units.
    pub amount: u64,
}
