//! # Unit Hashes
//!
//! | Hash | Covers | Form |
//! |------|--------|------|
//! | hash to sign | unit minus `unit`, `timestamp` and all authentifiers | 32 raw bytes |
//! | unit hash | unit minus `unit` and `timestamp` | base64 |
//! | ball hash | `{"unit": <unit hash>}` | base64 |
//!
//! All three are SHA-256 over canonical (sorted-key) JSON.

use serde_json::{json, Value};
use shared_crypto::{base64_hash, hashing::to_value, object_hash, Hash};
use shared_types::Unit;

use crate::domain::ComposeError;

fn content_value(unit: &Unit) -> Result<Value, ComposeError> {
    let mut value = to_value(unit)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("unit");
        object.remove("timestamp");
    }
    Ok(value)
}

/// Digest every author signs.
pub fn hash_to_sign(unit: &Unit) -> Result<Hash, ComposeError> {
    let mut value = content_value(unit)?;
    if let Some(authors) = value.get_mut("authors").and_then(Value::as_array_mut) {
        for author in authors {
            if let Some(author) = author.as_object_mut() {
                author.remove("authentifiers");
            }
        }
    }
    Ok(object_hash(&value)?)
}

/// Content hash, used as the unit identifier.
pub fn unit_hash(unit: &Unit) -> Result<String, ComposeError> {
    Ok(base64_hash(&content_value(unit)?)?)
}

/// Ball hash derived from a unit identifier.
pub fn ball_hash(unit_id: &str) -> Result<String, ComposeError> {
    Ok(base64_hash(&json!({ "unit": unit_id }))?)
}
