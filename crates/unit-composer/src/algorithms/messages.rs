//! # Message Builders
//!
//! Inline messages for the app kinds the composer attaches. Every builder
//! sets `payload_hash` to the base64 object hash of the payload.

use serde_json::{json, Map, Value};
use shared_crypto::base64_hash;
use shared_types::{Address, Message, PAYLOAD_LOCATION_INLINE};

use crate::domain::ComposeError;

/// App names.
pub mod apps {
    /// Oracle data feed.
    pub const DATA_FEED: &str = "data_feed";
    /// Arbitrary structured data.
    pub const DATA: &str = "data";
    /// Plain text.
    pub const TEXT: &str = "text";
    /// Author profile.
    pub const PROFILE: &str = "profile";
    /// Attestation of another address's profile.
    pub const ATTESTATION: &str = "attestation";
    /// Reusable definition template.
    pub const DEFINITION_TEMPLATE: &str = "definition_template";
    /// Payment.
    pub const PAYMENT: &str = "payment";
}

/// Inline message for `app` with `payload`.
pub fn inline_message(app: &str, payload: Value) -> Result<Message, ComposeError> {
    let payload_hash = base64_hash(&payload)?;
    Ok(Message {
        app: app.to_string(),
        payload_location: PAYLOAD_LOCATION_INLINE.to_string(),
        payload_hash,
        payload,
    })
}

/// Data feed. Values must be strings or integers.
pub fn data_feed(feed: Map<String, Value>) -> Result<Message, ComposeError> {
    if feed.is_empty() {
        return Err(ComposeError::InvalidMessage("data feed is empty".into()));
    }
    for (name, value) in &feed {
        let valid = match value {
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => n.is_i64() || n.is_u64(),
            _ => false,
        };
        if !valid {
            return Err(ComposeError::InvalidMessage(format!(
                "data feed value {name} must be a non-empty string or an integer"
            )));
        }
    }
    inline_message(apps::DATA_FEED, Value::Object(feed))
}

/// Data feed carrying only a millisecond timestamp, attached to recovery
/// units that have no other message.
pub fn timestamp_feed(timestamp_ms: i64) -> Result<Message, ComposeError> {
    let mut feed = Map::new();
    feed.insert("timestamp".into(), json!(timestamp_ms));
    data_feed(feed)
}

/// Arbitrary JSON object.
pub fn data(payload: Value) -> Result<Message, ComposeError> {
    if !payload.is_object() {
        return Err(ComposeError::InvalidMessage("data must be an object".into()));
    }
    inline_message(apps::DATA, payload)
}

/// Plain text.
pub fn text(body: impl Into<String>) -> Result<Message, ComposeError> {
    let body = body.into();
    if body.is_empty() {
        return Err(ComposeError::InvalidMessage("text is empty".into()));
    }
    inline_message(apps::TEXT, Value::String(body))
}

/// Profile of the authoring address.
pub fn profile(fields: Map<String, Value>) -> Result<Message, ComposeError> {
    if fields.is_empty() {
        return Err(ComposeError::InvalidMessage("profile is empty".into()));
    }
    inline_message(apps::PROFILE, Value::Object(fields))
}

/// Attestation of `subject`'s profile by the authoring address.
pub fn attestation(subject: &Address, fields: Map<String, Value>) -> Result<Message, ComposeError> {
    if fields.is_empty() {
        return Err(ComposeError::InvalidMessage("attested profile is empty".into()));
    }
    inline_message(
        apps::ATTESTATION,
        json!({ "address": subject, "profile": fields }),
    )
}

/// Definition template (an array expression with `@param` placeholders).
pub fn definition_template(template: Value) -> Result<Message, ComposeError> {
    if !template.is_array() {
        return Err(ComposeError::InvalidMessage(
            "definition template must be an array".into(),
        ));
    }
    inline_message(apps::DEFINITION_TEMPLATE, template)
}
