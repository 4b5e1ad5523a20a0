//! Procedural macros for `gridnode_engine`.
//!
//! This crate provides `#[derive(Workload)]` for declaring the persisted
//! state type of a workload.

mod workload;

use proc_macro::TokenStream;

/// Derive macro for the `Workload` trait.
///
/// # Attributes
///
/// - `kind` (optional): the record type tag. Defaults to the type's name.
///
/// # Example
///
/// ```ignore
/// use serde::{Serialize, Deserialize};
/// use gridnode_engine::base::Workload;
///
/// #[derive(Serialize, Deserialize, Workload)]
/// #[workload(kind = "zmount")]
/// struct Disk {
///     size: u64,
/// }
/// ```
#[proc_macro_derive(Workload, attributes(workload))]
pub fn derive_workload(input: TokenStream) -> TokenStream {
    workload::derive_workload(input)
}
