//! The generic provisioning engine of a grid node agent.
//!
//! A node runs many independently lifecycled workloads (virtual machines,
//! disks, networks, ...) submitted by remote tenants. This crate sequences
//! create, update and delete calls against those workloads so that concrete
//! workload implementations never re-check locking or existence rules:
//!
//! - [`guard`] - Reference-counted reader/writer locks keyed by object id
//! - [`flags`] - Access policy flags for actions and resources
//! - [`action`] - Type-erased action handlers
//! - [`resource`] - Workload type descriptors and the dispatch algorithm
//! - [`base`] - Typed access to persisted workload state
//! - [`context`] - Per-call scope handed to actions
//! - [`store`] - Persistence and dependency ledger interface
//! - [`envelope`] - Request/response shapes seen on the wire
//! - [`engine`] - Registry of resources and the dispatch entry point
//!
//! # Example
//!
//! ```
//! use gridnode_engine::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Workload)]
//! #[workload(kind = "disk")]
//! struct Disk {
//!     size: u64,
//! }
//!
//! let disk = ResourceBuilder::new::<Disk>(ResourceFlags::EXCLUSIVE)
//!     .with_action(
//!         "create",
//!         typed(|ctx: &dyn Context, disk: Disk| -> Result<(), ActionError> {
//!             BaseResource::<Disk>::new().set(ctx, &disk)?;
//!             Ok(())
//!         }),
//!         ActionFlags::CREATE,
//!     )
//!     .with_delete(typed(|_: &dyn Context, (): ()| -> Result<(), ActionError> { Ok(()) }))
//!     .build();
//!
//! assert_eq!(disk.name(), "disk");
//! assert!(disk.has_action("delete"));
//! ```

// Lets `#[derive(Workload)]` emit `gridnode_engine::` paths inside this crate.
extern crate self as gridnode_engine;

/// Type-erased action handlers.
pub mod action;

/// Typed access to persisted workload state.
pub mod base;

/// Per-call scope handed to actions.
pub mod context;

/// Resource registry and dispatch entry point.
pub mod engine;

/// Request and response envelopes.
pub mod envelope;

/// Engine error taxonomy.
pub mod error;

/// Access policy flags.
pub mod flags;

/// Per-object access guards.
pub mod guard;

/// Workload type descriptors and call dispatch.
pub mod resource;

/// Persistence interface consumed by the engine.
pub mod store;

/// Re-export the `#[derive(Workload)]` macro.
pub use gridnode_workload_macros::Workload;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::Workload;
    pub use crate::action::{Action, ActionError, typed};
    pub use crate::base::{BaseResource, Workload};
    pub use crate::context::{Context, EngineContext, ObjectKey, UserId};
    pub use crate::engine::{Engine, EngineBuilder};
    pub use crate::envelope::{ResourceRequest, ResourceResponse};
    pub use crate::error::EngineError;
    pub use crate::flags::{ActionFlags, ResourceFlags};
    pub use crate::guard::{Guard, GuardTable};
    pub use crate::resource::{DELETE_ACTION, Resource, ResourceBuilder};
    pub use crate::store::{Record, Store, StoreError};
}
