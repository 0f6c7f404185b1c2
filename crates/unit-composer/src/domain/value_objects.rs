//! # Value Objects
//!
//! Placeholders, disclosure decisions, parent selections and signing plans.

use serde_json::Value;
use shared_types::{Address, Author, ParentProps, SigningPath, Unit};
use std::collections::BTreeMap;

/// Filler character for unsigned authentifier slots. Not in the base64
/// alphabet, so a placeholder can never be mistaken for a signature.
pub const PLACEHOLDER_CHAR: char = '-';

/// Signing paths of one address with their expected signature lengths.
pub type SigningPaths = BTreeMap<SigningPath, usize>;

/// Signing paths per author, fixed when placeholders are written.
pub type SigningPlan = BTreeMap<Address, SigningPaths>;

/// Placeholder of exactly `len` characters.
pub fn placeholder(len: usize) -> String {
    std::iter::repeat(PLACEHOLDER_CHAR).take(len).collect()
}

/// Whether `value` is an unfilled placeholder.
pub fn is_placeholder(value: &str) -> bool {
    value.chars().all(|c| c == PLACEHOLDER_CHAR)
}

/// Why a definition is or is not disclosed inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisclosureDecision {
    /// The address never authored a stable good unit.
    FirstUse,
    /// The latest stable definition change targets an unknown definition.
    ChangeNotPersisted,
    /// Stable prior usage and no definition change.
    AlreadyKnown,
    /// Stable prior usage and the changed definition is persisted.
    ChangePersisted,
}

impl DisclosureDecision {
    /// Whether the definition must be attached to the author.
    pub fn requires_definition(&self) -> bool {
        matches!(
            self,
            DisclosureDecision::FirstUse | DisclosureDecision::ChangeNotPersisted
        )
    }
}

/// Parent references resolved for one composition.
#[derive(Clone, Debug, PartialEq)]
pub enum ParentSelection {
    /// Genesis: nothing to reference.
    Genesis,
    /// Parents and last stable ball.
    Props(ParentProps),
}

impl ParentSelection {
    /// Main-chain index author history is evaluated against.
    pub fn reference_mci(&self) -> u64 {
        match self {
            ParentSelection::Genesis => 0,
            ParentSelection::Props(props) => props.last_stable_mc_ball_mci,
        }
    }

    /// Copy parent and last-ball references onto the unit.
    pub fn apply_to(&self, unit: &mut Unit) {
        if let ParentSelection::Props(props) = self {
            unit.parent_units = Some(props.parent_units.clone());
            unit.last_ball = Some(props.last_stable_mc_ball.clone());
            unit.last_ball_unit = Some(props.last_stable_mc_ball_unit.clone());
        }
    }
}

/// One author record with its placeholder slots filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledAuthor {
    /// Author record (placeholders, optional definition).
    pub author: Author,
    /// Paths and lengths as reported by the signer.
    pub signing_paths: SigningPaths,
    /// Disclosure outcome.
    pub decision: DisclosureDecision,
}

impl AssembledAuthor {
    /// Definition attached to the author, if disclosed.
    pub fn definition(&self) -> Option<&Value> {
        self.author.definition.as_ref()
    }
}
