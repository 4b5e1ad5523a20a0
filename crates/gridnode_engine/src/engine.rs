//! Resource registry and dispatch entry point.
//!
//! The [`Engine`] owns the node's [`Store`] and one [`Resource`] per
//! workload type. The transport layer hands it `(user, space, kind,
//! request)` tuples; the engine builds the per-call [`EngineContext`] and
//! lets the resource dispatch.
//!
//! Every registered resource shares the engine's [`GuardTable`], keyed by
//! object id alone, so calls against one object serialize whichever kind
//! they are routed through.
//!
//! The engine also maintains dependencies between objects. A dependency is
//! reserved under the dependency's own object guard, so it cannot be deleted
//! while the reservation is being made. The reservation is visible to other
//! callers as soon as it passes its checks and is withdrawn if the caller's
//! scope fails.
//!
//! # Example
//!
//! ```
//! use gridnode_engine::prelude::*;
//! use gridnode_store::MemoryStore;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Serialize, Deserialize, Workload)]
//! #[workload(kind = "network")]
//! struct Network {
//!     subnet: String,
//! }
//!
//! let network = ResourceBuilder::new::<Network>(ResourceFlags::shareable())
//!     .with_action(
//!         "create",
//!         typed(|ctx: &dyn Context, net: Network| -> Result<(), ActionError> {
//!             Ok(BaseResource::<Network>::new().set(ctx, &net)?)
//!         }),
//!         ActionFlags::CREATE,
//!     )
//!     .build();
//!
//! let engine = Engine::builder(Arc::new(MemoryStore::new()))
//!     .with_resource(network)
//!     .build();
//!
//! let request = ResourceRequest::with_input(
//!     "create",
//!     "net1",
//!     &Network { subnet: "10.1.0.0/16".into() },
//! )?;
//! let response = engine.call(7, "default", "network", &request)?;
//! assert!(response.is_success());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::context::{EngineContext, ObjectKey, UserId};
use crate::envelope::{ResourceRequest, ResourceResponse};
use crate::error::EngineError;
use crate::guard::GuardTable;
use crate::resource::Resource;
use crate::store::{Store, StoreError};
use hashbrown::HashSet;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of workload types bound to a store.
pub struct Engine {
    store: Arc<dyn Store>,
    resources: IndexMap<&'static str, Resource>,
    guards: Arc<GuardTable>,
    /// Serializes the check-and-record step of dependency reservations.
    ledger: Mutex<()>,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("resources", &self.kinds())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Starts an engine over `store`.
    #[must_use]
    pub fn builder(store: Arc<dyn Store>) -> EngineBuilder {
        EngineBuilder::new(store)
    }

    /// The engine's store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Object guards shared by every registered resource.
    #[must_use]
    pub fn guards(&self) -> &GuardTable {
        &self.guards
    }

    /// Returns the resource registered for `kind`.
    #[must_use]
    pub fn resource(&self, kind: &str) -> Option<&Resource> {
        self.resources.get(kind)
    }

    /// Registered workload type names, in registration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    /// Creates the context for a call against `object`.
    pub fn context(
        &self,
        user: UserId,
        space: impl Into<String>,
        object: impl Into<String>,
    ) -> EngineContext<'_> {
        EngineContext::new(self, user, space, object)
    }

    /// Dispatches `request` to the resource registered for `kind`.
    ///
    /// # Errors
    ///
    /// [`EngineError::ResourceNotFound`] if `kind` is not registered, and
    /// every dispatch error of [`Resource::call`].
    pub fn call(
        &self,
        user: UserId,
        space: &str,
        kind: &str,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, EngineError> {
        let resource = self
            .resource(kind)
            .ok_or_else(|| EngineError::ResourceNotFound(kind.to_string()))?;

        let ctx = self.context(user, space, request.resource_id.as_str());
        resource.call(&ctx, request)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dependencies
    // ─────────────────────────────────────────────────────────────────────────

    /// Makes `master` depend on `slave` if `scope` succeeds.
    ///
    /// `slave` is held under a shared object lock for the whole of `scope`,
    /// so it cannot be deleted meanwhile. The cycle and exclusivity checks
    /// and the recording of the edge happen as one step, so concurrent
    /// reservations see each other. If `scope` fails, an edge recorded by
    /// this call is removed again.
    ///
    /// `scope` must not call back into the engine for `slave` with an
    /// exclusive action.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DependencyCycle`] if `slave` is `master` or already
    ///   depends on it, directly or transitively
    /// - [`EngineError::ObjectDoesNotExist`] if `slave` does not exist
    /// - [`EngineError::ResourceNotFound`] if `slave`'s type is not registered
    /// - [`EngineError::ObjectInUse`] if `slave` is exclusive and taken
    /// - any error returned by `scope`
    pub fn add_dependency<T, E, F>(
        &self,
        master: &ObjectKey,
        slave: &ObjectKey,
        scope: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<EngineError>,
    {
        if master == slave {
            return Err(EngineError::DependencyCycle {
                master: master.clone(),
                slave: slave.clone(),
            }
            .into());
        }

        let resource = self.resource_of(slave)?;
        let guard = self.guards.enter(slave.to_string());
        let _held = guard.read();

        if !self.store.record_exists(slave).map_err(EngineError::from)? {
            return Err(EngineError::ObjectDoesNotExist(slave.clone()).into());
        }

        let recorded = self.reserve(master, slave, resource)?;

        match scope() {
            Ok(output) => {
                tracing::debug!(%master, %slave, "dependency added");
                Ok(output)
            }
            Err(err) => {
                if recorded {
                    let _ledger = self.ledger.lock();
                    if let Err(undo) = self.store.dependency_remove(master, slave) {
                        tracing::error!(%master, %slave, error = %undo, "failed to withdraw dependency");
                    }
                }
                Err(err)
            }
        }
    }

    /// Checks and records the edge `master -> slave` atomically with respect
    /// to other reservations. Returns `true` if the edge is new.
    fn reserve(
        &self,
        master: &ObjectKey,
        slave: &ObjectKey,
        resource: &Resource,
    ) -> Result<bool, EngineError> {
        let _ledger = self.ledger.lock();

        if self.depends_on(slave, master)? {
            return Err(EngineError::DependencyCycle {
                master: master.clone(),
                slave: slave.clone(),
            });
        }

        let masters = self.store.masters(slave)?;
        if masters.contains(master) {
            return Ok(false);
        }
        if resource.flags().is_exclusive() && !masters.is_empty() {
            tracing::debug!(%master, %slave, "exclusive dependency already reserved");
            return Err(EngineError::ObjectInUse(slave.clone()));
        }

        self.store.dependency_add(master, slave)?;
        Ok(true)
    }

    /// Releases the dependency of `master` on `slave` if `scope` succeeds.
    ///
    /// Releasing a dependency that was never added is not an error.
    ///
    /// # Errors
    ///
    /// [`EngineError::ResourceNotFound`] if `slave`'s type is not
    /// registered, a store failure, or the error returned by `scope`.
    pub fn remove_dependency<T, E, F>(
        &self,
        master: &ObjectKey,
        slave: &ObjectKey,
        scope: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<EngineError>,
    {
        self.resource_of(slave)?;
        let guard = self.guards.enter(slave.to_string());
        let _held = guard.read();

        let output = scope()?;
        self.store
            .dependency_remove(master, slave)
            .map_err(EngineError::from)?;
        tracing::debug!(%master, %slave, "dependency removed");

        Ok(output)
    }

    /// Resource of the type recorded for `key`.
    fn resource_of(&self, key: &ObjectKey) -> Result<&Resource, EngineError> {
        let record = match self.store.record_get(key) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                return Err(EngineError::ObjectDoesNotExist(key.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        self.resource(&record.kind)
            .ok_or_else(|| EngineError::ResourceNotFound(record.kind))
    }

    /// Returns `true` if `from` depends on `target`, directly or through
    /// other objects.
    fn depends_on(&self, from: &ObjectKey, target: &ObjectKey) -> Result<bool, EngineError> {
        let mut pending = self.store.masters(target)?;
        let mut visited: HashSet<ObjectKey> = HashSet::new();

        while let Some(master) = pending.pop() {
            if &master == from {
                return Ok(true);
            }
            if visited.insert(master.clone()) {
                pending.extend(self.store.masters(&master)?);
            }
        }

        Ok(false)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EngineBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Collects the resources of an [`Engine`] at startup.
pub struct EngineBuilder {
    store: Arc<dyn Store>,
    resources: IndexMap<&'static str, Resource>,
    guards: Arc<GuardTable>,
}

impl core::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Starts a builder over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            resources: IndexMap::new(),
            guards: Arc::new(GuardTable::new()),
        }
    }

    /// Registers a workload type. From here on the resource guards its
    /// objects through the engine's shared table.
    ///
    /// # Panics
    ///
    /// Panics if a resource with the same name is already registered.
    #[must_use]
    pub fn with_resource(mut self, mut resource: Resource) -> Self {
        let name = resource.name();
        assert!(
            !self.resources.contains_key(name),
            "resource '{name}' is already registered"
        );
        resource.share_guards(Arc::clone(&self.guards));
        self.resources.insert(name, resource);
        self
    }

    /// Finishes the engine.
    #[must_use]
    pub fn build(self) -> Engine {
        tracing::info!(resources = ?self.resources.keys().collect::<Vec<_>>(), "engine ready");
        Engine {
            store: self.store,
            resources: self.resources,
            guards: self.guards,
            ledger: Mutex::new(()),
        }
    }
}
