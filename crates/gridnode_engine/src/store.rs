//! Persistence interface consumed by the engine.
//!
//! The engine never persists anything itself. It sequences access to a
//! [`Store`] that owns the records of provisioned objects and the ledger of
//! dependencies between them. The on-disk format, if any, is entirely the
//! store's business.

use crate::context::ObjectKey;
use serde::{Deserialize, Serialize};

/// Persisted state of one provisioned object.
///
/// `kind` is the workload type tag written by
/// [`BaseResource::set`](crate::base::BaseResource::set) and checked on
/// every read. `data` is the encoded workload state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Workload type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Encoded workload state.
    pub data: Vec<u8>,
}

impl Record {
    /// Creates a record.
    pub fn new(kind: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

/// Errors reported by a [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record is stored under the key.
    #[error("record not found: {0}")]
    NotFound(ObjectKey),

    /// The storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a [`Backend`](Self::Backend) error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Record storage and dependency ledger.
///
/// A dependency edge `master -> slave` means `master` relies on `slave`; a
/// slave cannot be deleted while any master remains. Deleting a record must
/// also drop every edge in which the deleted object is the master.
///
/// Every failure propagates out of the engine as a dispatch-level error.
pub trait Store: Send + Sync {
    /// Reads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if nothing is stored under `key`.
    fn record_get(&self, key: &ObjectKey) -> Result<Record, StoreError>;

    /// Returns `true` if a record is stored under `key`.
    fn record_exists(&self, key: &ObjectKey) -> Result<bool, StoreError>;

    /// Creates or replaces the record stored under `key`.
    fn record_set(&self, key: &ObjectKey, record: Record) -> Result<(), StoreError>;

    /// Removes the record under `key` and the edges where `key` is master.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if nothing is stored under `key`.
    fn record_delete(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// Records that `master` depends on `slave`. Adding an existing edge is
    /// a no-op.
    fn dependency_add(&self, master: &ObjectKey, slave: &ObjectKey) -> Result<(), StoreError>;

    /// Removes the edge `master -> slave`. Removing a missing edge is a no-op.
    fn dependency_remove(&self, master: &ObjectKey, slave: &ObjectKey)
    -> Result<(), StoreError>;

    /// Removes every edge where `master` is the dependent side and returns
    /// the objects released. Used when `master` goes away.
    fn dependencies_release(&self, master: &ObjectKey) -> Result<Vec<ObjectKey>, StoreError>;

    /// Returns every object that depends on `slave`.
    fn masters(&self, slave: &ObjectKey) -> Result<Vec<ObjectKey>, StoreError>;

    /// Returns `true` if any object depends on `key`.
    fn is_slave(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        Ok(!self.masters(key)?.is_empty())
    }
}
