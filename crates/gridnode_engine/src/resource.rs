//! Workload type descriptors and call dispatch.
//!
//! A [`Resource`] describes one workload type: its name, its dependency
//! sharing policy and the actions it supports. It holds a [`GuardTable`]
//! for its objects (its own until registered, the engine's shared table
//! after [`EngineBuilder::with_resource`]) and runs every call through the
//! same sequence:
//!
//! 1. Look up the action. Unknown names are rejected before any locking.
//! 2. Enter the object's guard.
//! 3. Take the writer lock for exclusive or must-not-exist actions, the
//!    reader lock otherwise.
//! 4. Re-check existence under the lock. An existing object must have been
//!    created by this resource.
//! 5. Refuse to delete an object that something else depends on.
//! 6. Run the handler; handler failures go into the response. A failed
//!    create gives up the dependencies it reserved.
//! 7. After a successful delete, remove the object's record.
//!
//! [`EngineBuilder::with_resource`]: crate::engine::EngineBuilder::with_resource
//!
//! The object lock is held while the handler runs, so a slow handler delays
//! every other call on the same object (and only on that object).
//!
//! Resources are created through [`ResourceBuilder`]:
//!
//! ```
//! use gridnode_engine::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Workload)]
//! #[workload(kind = "vm")]
//! struct Machine {
//!     cpu: u8,
//! }
//!
//! let vm = ResourceBuilder::new::<Machine>(ResourceFlags::shareable())
//!     .with_action(
//!         "create",
//!         typed(|ctx: &dyn Context, vm: Machine| -> Result<(), ActionError> {
//!             Ok(BaseResource::<Machine>::new().set(ctx, &vm)?)
//!         }),
//!         ActionFlags::CREATE,
//!     )
//!     .with_action(
//!         "cycle",
//!         typed(|_: &dyn Context, (): ()| -> Result<(), ActionError> { Ok(()) }),
//!         ActionFlags::EXCLUSIVE,
//!     )
//!     .with_delete(typed(|_: &dyn Context, (): ()| -> Result<(), ActionError> { Ok(()) }))
//!     .build();
//!
//! assert_eq!(vm.action_names(), vec!["create", "cycle", "delete"]);
//! ```

use crate::action::{Action, ActionError};
use crate::base::Workload;
use crate::context::Context;
use crate::envelope::{ResourceRequest, ResourceResponse};
use crate::error::EngineError;
use crate::flags::{ActionFlags, ResourceFlags};
use crate::guard::GuardTable;
use hashbrown::HashMap;
use serde_json::value::RawValue;
use std::sync::Arc;

/// Name of the reserved delete action.
pub const DELETE_ACTION: &str = "delete";

const RESERVED_ACTIONS: &[&str] = &[DELETE_ACTION];

/// A workload type registered with the engine.
pub struct Resource {
    name: &'static str,
    flags: ResourceFlags,
    actions: HashMap<String, Action>,
    guard: Arc<GuardTable>,
}

impl core::fmt::Debug for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("actions", &self.action_names())
            .finish()
    }
}

impl Resource {
    /// Workload type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Dependency sharing policy.
    #[must_use]
    pub fn flags(&self) -> ResourceFlags {
        self.flags
    }

    /// Returns the action registered under `name`.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    /// Returns `true` if an action named `name` is registered.
    #[must_use]
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Names of all registered actions, sorted.
    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Guards of objects that are currently in flight.
    #[must_use]
    pub fn guards(&self) -> &GuardTable {
        &self.guard
    }

    pub(crate) fn share_guards(&mut self, guards: Arc<GuardTable>) {
        self.guard = guards;
    }

    /// Dispatches `request` against the context's object.
    ///
    /// Returns `Ok` whenever the handler ran, including when it failed; its
    /// error is carried in [`ResourceResponse::error`].
    ///
    /// # Errors
    ///
    /// - [`EngineError::ActionNotFound`] if no such action is registered
    /// - [`EngineError::ObjectExists`] for a must-not-exist action on an existing object
    /// - [`EngineError::ObjectDoesNotExist`] for any other action on a missing object
    /// - [`EngineError::ObjectInvalidType`] if the object belongs to another resource
    /// - [`EngineError::ObjectInUse`] when deleting an object others depend on
    /// - [`EngineError::Store`] if the store fails, including when removing
    ///   the record after a successful delete
    pub fn call(
        &self,
        ctx: &dyn Context,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, EngineError> {
        let action = self
            .actions
            .get(request.action.as_str())
            .ok_or_else(|| EngineError::ActionNotFound(request.action.clone()))?;
        let flags = action.flags();

        let key = ctx.key();
        let _span = tracing::debug_span!(
            "dispatch",
            resource = self.name,
            action = %request.action,
            object = %key,
        )
        .entered();

        // The object does not have to exist: the guard is in-memory only and
        // disappears with the last call that entered it.
        let guard = self.guard.enter(key.to_string());
        let _held = guard.acquire(flags.requires_write());

        let exists = ctx.exists()?;
        if exists && flags.must_not_exist() {
            tracing::debug!("rejected: object exists");
            return Err(EngineError::ObjectExists(key));
        }
        if !exists && !flags.must_not_exist() {
            tracing::debug!("rejected: object does not exist");
            return Err(EngineError::ObjectDoesNotExist(key));
        }
        if exists {
            let found = ctx.store().record_get(&key)?.kind;
            if found != self.name {
                tracing::debug!(%found, "rejected: object has another type");
                return Err(EngineError::ObjectInvalidType {
                    key,
                    expected: self.name,
                    found,
                });
            }
        }

        let deleting = request.action == DELETE_ACTION;
        if deleting && ctx.store().is_slave(&key)? {
            tracing::warn!("rejected delete: object is a dependency");
            return Err(EngineError::ObjectInUse(key));
        }

        let mut response = ResourceResponse::default();
        match action.call(ctx, &request.payload) {
            Ok(output) => response.payload = Some(output),
            Err(err) => {
                tracing::debug!(error = %err, "action failed");
                if flags.must_not_exist() && !ctx.exists()? {
                    let released = ctx.store().dependencies_release(&key)?;
                    if !released.is_empty() {
                        tracing::debug!(released = released.len(), "reservations of failed create released");
                    }
                }
                response.error = err.to_string();
                return Ok(response);
            }
        }

        if deleting {
            ctx.store().record_delete(&key)?;
            tracing::info!("object deleted");
        }

        Ok(response)
    }
}

/// Builds the action table of a [`Resource`].
///
/// Registration mistakes are programming errors and panic at startup instead
/// of surfacing on every request.
pub struct ResourceBuilder {
    name: &'static str,
    flags: ResourceFlags,
    actions: HashMap<String, Action>,
}

impl core::fmt::Debug for ResourceBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceBuilder")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl ResourceBuilder {
    /// Starts a resource for workload state `R`, named after [`Workload::kind`].
    #[must_use]
    pub fn new<R: Workload>(flags: ResourceFlags) -> Self {
        Self {
            name: R::kind(),
            flags,
            actions: HashMap::new(),
        }
    }

    /// Registers an action.
    ///
    /// # Panics
    ///
    /// Panics if `name` is reserved (`"delete"`, see
    /// [`with_delete`](Self::with_delete)) or already registered.
    #[must_use]
    pub fn with_action<H>(self, name: impl Into<String>, handler: H, flags: ActionFlags) -> Self
    where
        H: Fn(&dyn Context, &RawValue) -> Result<Box<RawValue>, ActionError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        assert!(
            !RESERVED_ACTIONS.contains(&name.as_str()),
            "action '{name}' is reserved"
        );
        self.insert(name, Action::new(handler, flags))
    }

    /// Registers the delete action. Delete always runs exclusively.
    ///
    /// # Panics
    ///
    /// Panics if a delete action is already registered.
    #[must_use]
    pub fn with_delete<H>(self, handler: H) -> Self
    where
        H: Fn(&dyn Context, &RawValue) -> Result<Box<RawValue>, ActionError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(
            DELETE_ACTION.to_string(),
            Action::new(handler, ActionFlags::EXCLUSIVE),
        )
    }

    fn insert(mut self, name: String, action: Action) -> Self {
        assert!(
            !self.actions.contains_key(&name),
            "action '{name}' already exists"
        );
        self.actions.insert(name, action);
        self
    }

    /// Finishes the resource with an empty guard table.
    #[must_use]
    pub fn build(self) -> Resource {
        Resource {
            name: self.name,
            flags: self.flags,
            actions: self.actions,
            guard: Arc::new(GuardTable::new()),
        }
    }
}
