//! Request and response envelopes.
//!
//! These are the only shapes the transport needs to agree on. Payloads are
//! kept as raw JSON and handed to the action untouched; their schema belongs
//! to the workload type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

fn null_payload() -> Box<RawValue> {
    RawValue::NULL.to_owned()
}

/// A call against one object of a workload type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Name of the action to run.
    pub action: String,
    /// Target object name.
    #[serde(rename = "resource")]
    pub resource_id: String,
    /// Action input, opaque to the engine.
    #[serde(default = "null_payload")]
    pub payload: Box<RawValue>,
}

impl ResourceRequest {
    /// Creates a request with a raw payload.
    pub fn new(
        action: impl Into<String>,
        resource_id: impl Into<String>,
        payload: Box<RawValue>,
    ) -> Self {
        Self {
            action: action.into(),
            resource_id: resource_id.into(),
            payload,
        }
    }

    /// Creates a request whose payload is `input` encoded as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` cannot be encoded.
    pub fn with_input<T: Serialize>(
        action: impl Into<String>,
        resource_id: impl Into<String>,
        input: &T,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::value::to_raw_value(input)?;
        Ok(Self::new(action, resource_id, payload))
    }

    /// Creates a request with a `null` payload.
    pub fn empty(action: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self::new(action, resource_id, null_payload())
    }
}

/// Outcome of a dispatched call.
///
/// An empty `error` means the action succeeded. A non-empty one means the
/// call was routed and access checked, but the action itself failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceResponse {
    /// Action failure message, empty on success.
    #[serde(default)]
    pub error: String,
    /// Action output, opaque to the engine.
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

impl ResourceResponse {
    /// Returns `true` if the action succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Decodes the output payload. A missing payload decodes as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match `T`.
    pub fn output<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let raw = self.payload.as_deref().unwrap_or(RawValue::NULL);
        serde_json::from_str(raw.get())
    }
}
