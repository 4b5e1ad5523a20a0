//! Type-erased action handlers.
//!
//! An [`Action`] pairs a handler with the [`ActionFlags`] that tell dispatch
//! how to lock the object and which existence precondition applies. Handlers
//! see raw JSON payloads; [`typed`] adapts a handler over concrete input and
//! output types.

use crate::context::Context;
use crate::flags::ActionFlags;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use std::sync::Arc;

pub use crate::error::ActionError;

/// Handler signature shared by every action.
pub type Handler =
    dyn Fn(&dyn Context, &RawValue) -> Result<Box<RawValue>, ActionError> + Send + Sync;

/// A named operation on a workload type.
#[derive(Clone)]
pub struct Action {
    handler: Arc<Handler>,
    flags: ActionFlags,
}

impl core::fmt::Debug for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Action")
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl Action {
    /// Creates an action from a raw handler.
    pub fn new<H>(handler: H, flags: ActionFlags) -> Self
    where
        H: Fn(&dyn Context, &RawValue) -> Result<Box<RawValue>, ActionError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Arc::new(handler),
            flags,
        }
    }

    /// Access policy of this action.
    #[must_use]
    pub fn flags(&self) -> ActionFlags {
        self.flags
    }

    /// Runs the handler.
    ///
    /// # Errors
    ///
    /// Whatever the handler returns.
    pub fn call(&self, ctx: &dyn Context, payload: &RawValue) -> Result<Box<RawValue>, ActionError> {
        (self.handler)(ctx, payload)
    }
}

/// Adapts a handler over typed input and output.
///
/// The payload is decoded into `T` before `f` runs and the returned `O` is
/// encoded as the response payload. A payload that does not decode fails the
/// action with [`ActionError::InvalidPayload`].
///
/// # Example
///
/// ```
/// use gridnode_engine::action::{ActionError, typed};
/// use gridnode_engine::context::Context;
///
/// let resize = typed(|_ctx: &dyn Context, size: u64| -> Result<u64, ActionError> {
///     Ok(size * 2)
/// });
/// # let _ = resize;
/// ```
pub fn typed<T, O, F>(
    f: F,
) -> impl Fn(&dyn Context, &RawValue) -> Result<Box<RawValue>, ActionError> + Send + Sync + 'static
where
    T: DeserializeOwned + 'static,
    O: Serialize + 'static,
    F: Fn(&dyn Context, T) -> Result<O, ActionError> + Send + Sync + 'static,
{
    move |ctx: &dyn Context, payload: &RawValue| {
        let input: T = serde_json::from_str(payload.get()).map_err(ActionError::InvalidPayload)?;
        let output = f(ctx, input)?;
        serde_json::value::to_raw_value(&output).map_err(ActionError::InvalidOutput)
    }
}
