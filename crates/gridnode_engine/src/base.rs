//! Typed access to persisted workload state.
//!
//! Every workload type needs the same plumbing: load my state, store my
//! state, reserve the objects I depend on. [`BaseResource`] provides it once,
//! parameterized over the state type, and tags each record with the type's
//! [`Workload::kind`] so one type never decodes another's record.
//!
//! # Example
//!
//! ```
//! use gridnode_engine::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Workload)]
//! struct Network {
//!     subnet: String,
//! }
//!
//! const NETWORK: BaseResource<Network> = BaseResource::new();
//!
//! fn create(ctx: &dyn Context, network: Network) -> Result<(), ActionError> {
//!     NETWORK.set(ctx, &network)?;
//!     Ok(())
//! }
//!
//! fn subnet(ctx: &dyn Context, (): ()) -> Result<String, ActionError> {
//!     Ok(NETWORK.current(ctx)?.subnet)
//! }
//!
//! assert_eq!(Network::kind(), "Network");
//! # let _ = (typed(create), typed(subnet));
//! ```

use crate::context::Context;
use crate::error::EngineError;
use crate::store::Record;
use core::marker::PhantomData;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Persisted state of a workload type.
///
/// Can be derived via `#[derive(Workload)]`, optionally with
/// `#[workload(kind = "...")]` to override the type tag.
pub trait Workload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type tag stored with every record. Defaults to the unqualified type
    /// name.
    fn kind() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Unqualified name of `T`, without module path or generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = core::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Typed accessor for the state of objects of type `R`.
pub struct BaseResource<R> {
    _marker: PhantomData<fn() -> R>,
}

impl<R> Clone for BaseResource<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for BaseResource<R> {}

impl<R> Default for BaseResource<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> core::fmt::Debug for BaseResource<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BaseResource")
            .field("type", &core::any::type_name::<R>())
            .finish()
    }
}

impl<R> BaseResource<R> {
    /// Creates the accessor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<R: Workload> BaseResource<R> {
    /// Loads the state of the context's object.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ObjectDoesNotExist`] if the object does not exist
    /// - [`EngineError::ObjectInvalidType`] if the record belongs to another type
    /// - [`EngineError::Decode`] if the record does not decode as `R`
    /// - [`EngineError::Store`] if the store fails
    pub fn current(&self, ctx: &dyn Context) -> Result<R, EngineError> {
        let key = ctx.key();
        if !ctx.exists()? {
            return Err(EngineError::ObjectDoesNotExist(key));
        }

        let record = ctx.store().record_get(&key)?;
        if record.kind != R::kind() {
            return Err(EngineError::ObjectInvalidType {
                key,
                expected: R::kind(),
                found: record.kind,
            });
        }

        serde_json::from_slice(&record.data).map_err(|source| EngineError::Decode {
            key,
            kind: record.kind,
            source,
        })
    }

    /// Stores `resource` as the state of the context's object.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the store fails.
    pub fn set(&self, ctx: &dyn Context, resource: &R) -> Result<(), EngineError> {
        let data = serde_json::to_vec(resource).map_err(|source| EngineError::Encode {
            kind: R::kind(),
            source,
        })?;

        ctx.store()
            .record_set(&ctx.key(), Record::new(R::kind(), data))?;
        Ok(())
    }

    /// Reserves `object`, in the same space, as a dependency of the
    /// context's object.
    ///
    /// `object` is held for the whole of `scope`; the reservation becomes
    /// permanent only if `scope` succeeds. See [`Engine::add_dependency`].
    ///
    /// [`Engine::add_dependency`]: crate::engine::Engine::add_dependency
    ///
    /// # Errors
    ///
    /// Returns the engine's rejection or the error returned by `scope`.
    pub fn add_dependency<T, E, F>(
        &self,
        ctx: &dyn Context,
        object: &str,
        scope: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<EngineError>,
    {
        let master = ctx.key();
        let slave = master.sibling(object);
        ctx.engine().add_dependency(&master, &slave, scope)
    }

    /// Releases `object` as a dependency of the context's object once
    /// `scope` succeeds. See [`Engine::remove_dependency`].
    ///
    /// [`Engine::remove_dependency`]: crate::engine::Engine::remove_dependency
    ///
    /// # Errors
    ///
    /// Returns the engine's rejection or the error returned by `scope`.
    pub fn remove_dependency<T, E, F>(
        &self,
        ctx: &dyn Context,
        object: &str,
        scope: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<EngineError>,
    {
        let master = ctx.key();
        let slave = master.sibling(object);
        ctx.engine().remove_dependency(&master, &slave, scope)
    }
}
