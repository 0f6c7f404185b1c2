//! # Unit Finalizer
//!
//! Stamps round fields on genesis and recovery units, assigns the content
//! hash once every authentifier is signed, attaches the ball where needed
//! and stamps the wall-clock timestamp light clients rely on.

use shared_types::{Joint, Unit, POW_TYPE_TRUSTME};

use super::unit_hash::{ball_hash, unit_hash};
use crate::domain::{invariant_fully_signed, ComposeError, CompositionKind, ParentSelection};

/// Set `round_index`, `pow_type`, `hp` and `phase` for genesis and recovery
/// units. Regular units are left untouched.
///
/// Must run before the hash to sign is computed.
pub fn stamp_round_fields(
    unit: &mut Unit,
    kind: CompositionKind,
    selection: &ParentSelection,
    genesis_round_index: u64,
) -> Result<(), ComposeError> {
    let (round_index, hp) = match (kind, selection) {
        (CompositionKind::Regular, _) => return Ok(()),
        (CompositionKind::Genesis, _) => (genesis_round_index, 0),
        (CompositionKind::Recovery, ParentSelection::Props(props)) => (
            props.round_index,
            props.last_stable_mc_ball_mci.saturating_add(1),
        ),
        (CompositionKind::Recovery, ParentSelection::Genesis) => {
            return Err(ComposeError::Internal(
                "recovery unit without parent props".into(),
            ))
        }
    };
    unit.round_index = Some(round_index);
    unit.pow_type = Some(POW_TYPE_TRUSTME);
    unit.hp = Some(hp);
    unit.phase = Some(0);
    Ok(())
}

/// Assign the unit hash, attach the ball and the timestamp.
pub fn finalize_unit(
    mut unit: Unit,
    kind: CompositionKind,
    timestamp_secs: u64,
) -> Result<Joint, ComposeError> {
    if unit.is_finalized() {
        return Err(ComposeError::Internal("unit is already finalized".into()));
    }
    invariant_fully_signed(&unit)?;

    let id = unit_hash(&unit)?;
    let ball = if kind.attaches_ball() {
        Some(ball_hash(&id)?)
    } else {
        None
    };
    unit.unit = Some(id);
    unit.timestamp = Some(timestamp_secs);
    Ok(Joint { unit, ball })
}
