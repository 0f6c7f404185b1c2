//! # Parent Selector
//!
//! Resolves the parent units and last stable ball a unit builds on.
//!
//! - **Light**: one vendor round trip, validated field by field, then the
//!   fetched props are used exactly as a full node would use its own.
//! - **Full**: free units and last stable ball from the open snapshot.
//! - **Genesis**: nothing to reference; predecessor check skipped.

use serde_json::{json, Map, Value};
use shared_types::{Address, ParentProps};

use crate::domain::{ComposeError, CompositionKind, ParentSelection};
use crate::ports::{LedgerTransaction, LightVendor};

fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Result<&'a Value, ComposeError> {
    object
        .get(name)
        .ok_or_else(|| ComposeError::InvalidParentData(format!("missing {name}")))
}

fn string_field(object: &Map<String, Value>, name: &str) -> Result<String, ComposeError> {
    match field(object, name)? {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        other => Err(ComposeError::InvalidParentData(format!(
            "{name} must be a non-empty string, got {other}"
        ))),
    }
}

fn index_field(object: &Map<String, Value>, name: &str) -> Result<u64, ComposeError> {
    field(object, name)?.as_u64().ok_or_else(|| {
        ComposeError::InvalidParentData(format!("{name} must be a non-negative integer"))
    })
}

/// Check that a vendor response carries all five parent fields with the
/// right types.
pub fn validate_vendor_response(response: &Value) -> Result<ParentProps, ComposeError> {
    let object = response
        .as_object()
        .ok_or_else(|| ComposeError::InvalidParentData("response is not an object".into()))?;

    let parent_units = match field(object, "parent_units")? {
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Value::String(s) if !s.is_empty() => Ok(s.clone()),
                _ => Err(ComposeError::InvalidParentData(
                    "parent_units must contain unit hashes".into(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(ComposeError::InvalidParentData(
                "parent_units must be a non-empty array".into(),
            ))
        }
    };

    Ok(ParentProps {
        parent_units,
        last_stable_mc_ball: string_field(object, "last_stable_mc_ball")?,
        last_stable_mc_ball_unit: string_field(object, "last_stable_mc_ball_unit")?,
        last_stable_mc_ball_mci: index_field(object, "last_stable_mc_ball_mci")?,
        round_index: index_field(object, "round_index")?,
    })
}

/// Ask the light vendor for parent props. No automatic retry.
pub async fn fetch_light_props(
    vendor: &dyn LightVendor,
    method: &str,
    addresses: &[Address],
) -> Result<ParentProps, ComposeError> {
    let params = json!({ "paying_addresses": addresses });
    let response = vendor
        .request(method, params)
        .await
        .map_err(ComposeError::Vendor)?;
    let props = validate_vendor_response(&response)?;
    tracing::debug!(
        method,
        mci = props.last_stable_mc_ball_mci,
        round_index = props.round_index,
        "[composer] Light props received"
    );
    Ok(props)
}

/// Fail with `UnstablePredecessor` if any address has unstable history
/// above `last_ball_mci`.
pub async fn check_unstable_predecessors(
    tx: &mut dyn LedgerTransaction,
    addresses: &[Address],
    last_ball_mci: u64,
) -> Result<(), ComposeError> {
    if tx.has_unstable_predecessors(addresses, last_ball_mci).await? {
        return Err(ComposeError::UnstablePredecessor);
    }
    Ok(())
}

/// Resolve parents inside the open snapshot.
///
/// `light_props`, when present, are used as ground truth instead of the
/// local free units.
pub async fn select_parents(
    tx: &mut dyn LedgerTransaction,
    kind: CompositionKind,
    addresses: &[Address],
    light_props: Option<ParentProps>,
) -> Result<ParentSelection, ComposeError> {
    if !kind.selects_parents() {
        return Ok(ParentSelection::Genesis);
    }
    let props = match light_props {
        Some(props) => props,
        None => tx.read_parent_props().await?,
    };
    check_unstable_predecessors(tx, addresses, props.last_stable_mc_ball_mci).await?;
    Ok(ParentSelection::Props(props))
}
