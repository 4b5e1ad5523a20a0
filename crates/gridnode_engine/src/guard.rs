//! Per-object access guards.
//!
//! A [`GuardTable`] hands out [`Guard`]s keyed by a fully-qualified object id
//! (`user/space/object`). Entering a guard only registers interest and never
//! waits on the object lock; the reader/writer lock embedded in the guard is
//! what serializes calls against the same object.
//!
//! Entries are reference counted: the first `enter` for an id creates the
//! entry, the last exit removes it. The table therefore only ever holds ids
//! that are in flight, no matter how many objects the node has seen.
//!
//! # Example
//!
//! ```
//! use gridnode_engine::guard::GuardTable;
//!
//! let table = GuardTable::new();
//!
//! {
//!     let guard = table.enter("7/default/vm1");
//!     let _write = guard.lock();
//!     assert_eq!(table.ref_count("7/default/vm1"), 1);
//! }
//!
//! // Dropping the guard exits it.
//! assert!(table.is_empty());
//! ```

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Table slot for one object id.
struct GuardEntry {
    lock: Arc<RwLock<()>>,
    count: usize,
}

/// Reference-counted table of per-object reader/writer locks.
///
/// The table mutex is only held while looking up, inserting or removing an
/// entry. It is never held while a caller waits on, or holds, an object lock.
#[derive(Default)]
pub struct GuardTable {
    guards: Mutex<HashMap<String, GuardEntry>>,
}

impl core::fmt::Debug for GuardTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuardTable")
            .field("entries", &self.len())
            .finish()
    }
}

impl GuardTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// Registers interest in `id` and returns its guard.
    ///
    /// Never blocks on the object lock. Concurrent calls for the same id
    /// share a single entry.
    pub fn enter(&self, id: impl Into<String>) -> Guard<'_> {
        let id = id.into();
        let lock = {
            let mut guards = self.guards.lock();
            let entry = guards.entry(id.clone()).or_insert_with(|| GuardEntry {
                lock: Arc::new(RwLock::new(())),
                count: 0,
            });
            entry.count += 1;
            Arc::clone(&entry.lock)
        };

        Guard {
            table: self,
            id,
            lock,
        }
    }

    /// Drops one reference to `id`, removing the entry when none remain.
    ///
    /// # Panics
    ///
    /// Panics if `id` has no outstanding reference. That can only happen when
    /// enter/exit pairing is broken, and guard state must not be trusted
    /// afterwards.
    pub(crate) fn exit(&self, id: &str) {
        let mut guards = self.guards.lock();
        let Some(entry) = guards.get_mut(id) else {
            panic!("invalid guard exit: '{id}' has no outstanding enter");
        };

        entry.count -= 1;
        if entry.count == 0 {
            guards.remove(id);
        }
    }

    /// Returns the number of outstanding references to `id`.
    #[must_use]
    pub fn ref_count(&self, id: &str) -> usize {
        self.guards.lock().get(id).map_or(0, |entry| entry.count)
    }

    /// Returns `true` if an entry exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.guards.lock().contains_key(id)
    }

    /// Returns the number of ids currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.lock().len()
    }

    /// Returns `true` if no id is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.lock().is_empty()
    }
}

/// A registered interest in one object id.
///
/// The guard exits its table exactly once, when dropped. Lock guards borrow
/// the `Guard`, so an object lock can never outlive the guard it came from.
pub struct Guard<'a> {
    table: &'a GuardTable,
    id: String,
    lock: Arc<RwLock<()>>,
}

impl core::fmt::Debug for Guard<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Guard").field("id", &self.id).finish()
    }
}

impl Guard<'_> {
    /// The fully-qualified object id this guard protects.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Acquires exclusive access, blocking until available.
    pub fn lock(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }

    /// Acquires shared access, blocking until available.
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    /// Attempts exclusive access without blocking.
    pub fn try_lock(&self) -> Option<RwLockWriteGuard<'_, ()>> {
        self.lock.try_write()
    }

    /// Attempts shared access without blocking.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, ()>> {
        self.lock.try_read()
    }

    /// Acquires the writer side when `exclusive`, the reader side otherwise.
    pub fn acquire(&self, exclusive: bool) -> ObjectLock<'_> {
        if exclusive {
            ObjectLock::Exclusive(self.lock())
        } else {
            ObjectLock::Shared(self.read())
        }
    }

    /// Exits the guard now instead of at the end of scope.
    pub fn exit(self) {
        drop(self);
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        self.table.exit(&self.id);
    }
}

/// An object lock held through a [`Guard`]. Released on drop.
#[derive(Debug)]
pub enum ObjectLock<'a> {
    /// Writer side; excludes every other holder.
    Exclusive(RwLockWriteGuard<'a, ()>),
    /// Reader side; shared with other readers.
    Shared(RwLockReadGuard<'a, ()>),
}

impl ObjectLock<'_> {
    /// Returns `true` for the writer side.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive(_))
    }
}
