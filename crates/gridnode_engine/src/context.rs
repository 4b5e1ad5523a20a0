//! Per-call scope handed to actions.
//!
//! A [`Context`] tells an action who is calling ([`Context::user`],
//! [`Context::space`]), which object the call targets ([`Context::object`]),
//! and gives it a way back to the owning [`Engine`] and its [`Store`].
//! The dispatch layer creates one per request; [`EngineContext`] is the
//! implementation used by [`Engine::call`].

use crate::engine::Engine;
use crate::store::{Store, StoreError};
use serde::{Deserialize, Serialize};

/// Identifier of the tenant issuing a call.
pub type UserId = u32;

/// Fully-qualified identity of a provisioned object.
///
/// Displays as `user/space/object`, the form used to key object guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Owning tenant.
    pub user: UserId,
    /// Tenant space (deployment) the object lives in.
    pub space: String,
    /// Object name within the space.
    pub object: String,
}

impl ObjectKey {
    /// Creates a key.
    pub fn new(user: UserId, space: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            user,
            space: space.into(),
            object: object.into(),
        }
    }

    /// Returns the key of another object in the same user space.
    #[must_use]
    pub fn sibling(&self, object: impl Into<String>) -> Self {
        Self::new(self.user, self.space.clone(), object)
    }
}

impl core::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}/{}", self.user, self.space, self.object)
    }
}

/// Scope of a single engine call.
pub trait Context {
    /// Calling tenant.
    fn user(&self) -> UserId;

    /// Space the target object lives in.
    fn space(&self) -> &str;

    /// Target object name.
    fn object(&self) -> &str;

    /// Engine that dispatched the call.
    fn engine(&self) -> &Engine;

    /// Store of the owning engine.
    fn store(&self) -> &dyn Store {
        self.engine().store()
    }

    /// Queries the store for the target object.
    ///
    /// Evaluated live, so a check made after acquiring the object lock sees
    /// the effect of any call that held the lock before.
    fn exists(&self) -> Result<bool, StoreError> {
        self.store().record_exists(&self.key())
    }

    /// Fully-qualified key of the target object.
    fn key(&self) -> ObjectKey {
        ObjectKey::new(self.user(), self.space(), self.object())
    }
}

/// Context created by [`Engine::call`] for each request.
#[derive(Debug)]
pub struct EngineContext<'a> {
    engine: &'a Engine,
    user: UserId,
    space: String,
    object: String,
}

impl<'a> EngineContext<'a> {
    /// Creates a context targeting `object` in the given user space.
    pub fn new(
        engine: &'a Engine,
        user: UserId,
        space: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            user,
            space: space.into(),
            object: object.into(),
        }
    }
}

impl Context for EngineContext<'_> {
    fn user(&self) -> UserId {
        self.user
    }

    fn space(&self) -> &str {
        &self.space
    }

    fn object(&self) -> &str {
        &self.object
    }

    fn engine(&self) -> &Engine {
        self.engine
    }
}
