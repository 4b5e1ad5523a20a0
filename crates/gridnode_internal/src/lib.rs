//! # Gridnode Internal Library
//!
//! Re-exports the core gridnode crates for convenience.

/// Provisioning engine: guards, resources, dispatch.
pub use gridnode_engine;

/// Reference in-memory store and dependency ledger.
pub use gridnode_store;

/// Tracing subscriber configuration.
#[cfg(feature = "telemetry")]
pub use gridnode_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use gridnode_engine::prelude::*;
    pub use gridnode_store::MemoryStore;
}
