//! # Object Hashing
//!
//! SHA-256 over a canonical JSON rendering of a value.
//!
//! The canonical form sorts object keys at every depth and emits no
//! whitespace, so two structurally equal values always hash the same no
//! matter how they were built.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::CryptoError;

/// SHA-256 output (256-bit).
pub type Hash = [u8; 32];

/// Hash raw bytes with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Convert any serializable value into a JSON value tree.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, CryptoError> {
    serde_json::to_value(value).map_err(|e| CryptoError::Serialization(e.to_string()))
}

/// Render a JSON value canonically: sorted keys, no whitespace.
///
/// Keys are sorted here rather than relying on `serde_json::Map` being a
/// `BTreeMap`, which stops holding once any crate in the build enables
/// serde_json's `preserve_order` feature.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 of the canonical JSON of `value`.
pub fn object_hash<T: Serialize + ?Sized>(value: &T) -> Result<Hash, CryptoError> {
    let tree = to_value(value)?;
    Ok(sha256(canonical_json(&tree).as_bytes()))
}

/// Base64 encoded [`object_hash`] (44 characters).
pub fn base64_hash<T: Serialize + ?Sized>(value: &T) -> Result<String, CryptoError> {
    Ok(encode_base64(&object_hash(value)?))
}

/// Standard base64 with padding.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(text)
        .map_err(|e| CryptoError::InvalidBase64(e.to_string()))
}
