//! # Domain Invariants
//!
//! Rules every composition must satisfy.

use shared_types::{Address, Author, Unit};

use super::errors::ComposeError;
use super::value_objects::{is_placeholder, SigningPaths, SigningPlan};

/// Paying addresses sorted and deduplicated.
///
/// The result is both the lock set and the author order.
pub fn invariant_sorted_addresses(addresses: &[Address]) -> Result<Vec<Address>, ComposeError> {
    if addresses.is_empty() {
        return Err(ComposeError::NoPayingAddresses);
    }
    let mut sorted = addresses.to_vec();
    sorted.sort();
    sorted.dedup();
    Ok(sorted)
}

/// Every slot holds a placeholder of exactly the declared length, and the
/// slot set equals the declared path set.
pub fn invariant_placeholders_sized(author: &Author, paths: &SigningPaths) -> bool {
    author.authentifiers.len() == paths.len()
        && paths.iter().all(|(path, len)| {
            author
                .authentifiers
                .get(path)
                .is_some_and(|value| value.len() == *len && is_placeholder(value))
        })
}

/// Authentifier paths still match the plan fixed at assembly time.
pub fn invariant_paths_unchanged(unit: &Unit, plan: &SigningPlan) -> Result<(), ComposeError> {
    if unit.authors.len() != plan.len() {
        return Err(ComposeError::Internal(format!(
            "{} authors but {} signing plans",
            unit.authors.len(),
            plan.len()
        )));
    }
    for author in &unit.authors {
        let paths = plan.get(&author.address).ok_or_else(|| {
            ComposeError::Internal(format!("no signing plan for {}", author.address))
        })?;
        if !author.authentifiers.keys().eq(paths.keys()) {
            return Err(ComposeError::Internal(format!(
                "signing paths of {} changed after assembly",
                author.address
            )));
        }
    }
    Ok(())
}

/// No authentifier is still a placeholder.
pub fn invariant_fully_signed(unit: &Unit) -> Result<(), ComposeError> {
    for author in &unit.authors {
        if let Some((path, _)) = author
            .authentifiers
            .iter()
            .find(|(_, value)| is_placeholder(value))
        {
            return Err(ComposeError::Internal(format!(
                "authentifier {}/{} is unsigned",
                author.address, path
            )));
        }
    }
    Ok(())
}
