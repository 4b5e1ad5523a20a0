//! In-memory record store and dependency ledger for the gridnode engine.
//!
//! [`MemoryStore`] implements [`Store`] over hash maps. It keeps no data
//! across restarts, which makes it suitable for tests and for embedders that
//! rebuild node state from elsewhere.
//!
//! # Example
//!
//! ```
//! use gridnode_engine::context::ObjectKey;
//! use gridnode_engine::store::{Record, Store};
//! use gridnode_store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let vm = ObjectKey::new(1, "default", "vm1");
//! let disk = vm.sibling("d1");
//!
//! store.record_set(&disk, Record::new("disk", b"{}".to_vec()))?;
//! store.dependency_add(&vm, &disk)?;
//! assert!(store.is_slave(&disk)?);
//! # Ok::<(), gridnode_engine::store::StoreError>(())
//! ```

use gridnode_engine::context::ObjectKey;
use gridnode_engine::store::{Record, Store, StoreError};
use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

/// Records plus dependency edges in both directions.
#[derive(Default)]
struct State {
    records: HashMap<ObjectKey, Record>,
    /// master -> objects it depends on
    slaves: HashMap<ObjectKey, HashSet<ObjectKey>>,
    /// slave -> objects depending on it
    masters: HashMap<ObjectKey, HashSet<ObjectKey>>,
}

impl State {
    fn unlink(&mut self, master: &ObjectKey, slave: &ObjectKey) {
        if let Some(slaves) = self.slaves.get_mut(master) {
            slaves.remove(slave);
            if slaves.is_empty() {
                self.slaves.remove(master);
            }
        }
        if let Some(masters) = self.masters.get_mut(slave) {
            masters.remove(master);
            if masters.is_empty() {
                self.masters.remove(slave);
            }
        }
    }

    fn release(&mut self, master: &ObjectKey) -> Vec<ObjectKey> {
        let released: Vec<ObjectKey> = self
            .slaves
            .get(master)
            .map(|slaves| slaves.iter().cloned().collect())
            .unwrap_or_default();
        for slave in &released {
            self.unlink(master, slave);
        }
        released
    }
}

/// Volatile [`Store`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl core::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryStore")
            .field("records", &state.records.len())
            .field("dependents", &state.slaves.len())
            .finish()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Returns `true` if no record is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Objects `master` depends on, sorted.
    #[must_use]
    pub fn dependencies_of(&self, master: &ObjectKey) -> Vec<ObjectKey> {
        let state = self.state.read();
        let mut slaves: Vec<ObjectKey> = state
            .slaves
            .get(master)
            .map(|slaves| slaves.iter().cloned().collect())
            .unwrap_or_default();
        slaves.sort();
        slaves
    }
}

impl Store for MemoryStore {
    fn record_get(&self, key: &ObjectKey) -> Result<Record, StoreError> {
        self.state
            .read()
            .records
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn record_exists(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        Ok(self.state.read().records.contains_key(key))
    }

    fn record_set(&self, key: &ObjectKey, record: Record) -> Result<(), StoreError> {
        self.state.write().records.insert(key.clone(), record);
        Ok(())
    }

    fn record_delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.records.remove(key).is_none() {
            return Err(StoreError::NotFound(key.clone()));
        }

        let released = state.release(key);
        if !released.is_empty() {
            tracing::debug!(master = %key, released = released.len(), "dependencies released");
        }

        Ok(())
    }

    fn dependency_add(&self, master: &ObjectKey, slave: &ObjectKey) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state
            .slaves
            .entry(master.clone())
            .or_default()
            .insert(slave.clone());
        state
            .masters
            .entry(slave.clone())
            .or_default()
            .insert(master.clone());
        Ok(())
    }

    fn dependency_remove(
        &self,
        master: &ObjectKey,
        slave: &ObjectKey,
    ) -> Result<(), StoreError> {
        self.state.write().unlink(master, slave);
        Ok(())
    }

    fn dependencies_release(&self, master: &ObjectKey) -> Result<Vec<ObjectKey>, StoreError> {
        Ok(self.state.write().release(master))
    }

    fn masters(&self, slave: &ObjectKey) -> Result<Vec<ObjectKey>, StoreError> {
        let state = self.state.read();
        Ok(state
            .masters
            .get(slave)
            .map(|masters| masters.iter().cloned().collect())
            .unwrap_or_default())
    }
}
