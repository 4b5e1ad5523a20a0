//! Provisioning core for grid node agents.
//!

pub use gridnode_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use gridnode_internal::prelude::*;
}
