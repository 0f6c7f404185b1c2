//! Light vendor adapter answering from a fixed response.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::ParentProps;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ports::LightVendor;

/// Vendor that returns the same response (or error) to every request.
pub struct StaticLightVendor {
    response: Result<Value, String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, Value)>>,
}

impl StaticLightVendor {
    /// Answer every request with `response`.
    pub fn new(response: Value) -> Self {
        Self {
            response: Ok(response),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Answer every request with an error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Answer with well-formed parent props.
    pub fn from_props(props: &ParentProps) -> Self {
        Self::new(serde_json::to_value(props).unwrap_or(Value::Null))
    }

    /// Requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Method and params of the latest request.
    pub fn last_request(&self) -> Option<(String, Value)> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl LightVendor for StaticLightVendor {
    async fn request(&self, method: &str, params: Value) -> Result<Value, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some((method.to_string(), params));
        self.response.clone()
    }
}
