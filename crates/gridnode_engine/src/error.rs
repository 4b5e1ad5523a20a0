//! Engine error taxonomy.
//!
//! [`EngineError`] covers everything the engine itself rejects: the call was
//! not routed, a precondition failed, or the store failed. [`ActionError`]
//! is what action handlers return; dispatch turns it into the `error` field
//! of a [`ResourceResponse`](crate::envelope::ResourceResponse) instead of
//! failing the call.

use crate::context::ObjectKey;
use crate::store::StoreError;
use thiserror::Error;

/// Dispatch-level failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The resource type has no action with this name.
    #[error("action not found: {0}")]
    ActionNotFound(String),

    /// No resource type with this name is registered.
    #[error("resource type not found: {0}")]
    ResourceNotFound(String),

    /// A must-not-exist action targeted an existing object.
    #[error("object already exists: {0}")]
    ObjectExists(ObjectKey),

    /// An action targeted an object that does not exist.
    #[error("object does not exist: {0}")]
    ObjectDoesNotExist(ObjectKey),

    /// The object is a dependency of another object.
    #[error("object is in use: {0}")]
    ObjectInUse(ObjectKey),

    /// The stored record belongs to a different workload type.
    #[error("object {key} has type '{found}', expected '{expected}'")]
    ObjectInvalidType {
        /// Object whose record was read.
        key: ObjectKey,
        /// Type tag the caller asked for.
        expected: &'static str,
        /// Type tag found in the record.
        found: String,
    },

    /// The dependency would make an object depend on itself.
    #[error("dependency of {master} on {slave} would create a cycle")]
    DependencyCycle {
        /// Dependent object.
        master: ObjectKey,
        /// Object depended upon.
        slave: ObjectKey,
    },

    /// The stored record could not be decoded.
    #[error("failed to decode resource {key} as type {kind}: {source}")]
    Decode {
        /// Object whose record was read.
        key: ObjectKey,
        /// Declared type tag.
        kind: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The workload state could not be encoded.
    #[error("failed to encode resource of type {kind}: {source}")]
    Encode {
        /// Declared type tag.
        kind: &'static str,
        /// Encoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors returned by action handlers.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The request payload does not match the action's input type.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// The action output could not be encoded.
    #[error("invalid output: {0}")]
    InvalidOutput(#[source] serde_json::Error),

    /// The workload operation failed.
    #[error("{0}")]
    Failed(String),

    /// An engine operation made by the handler failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ActionError {
    /// Creates a [`Failed`](Self::Failed) error.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
