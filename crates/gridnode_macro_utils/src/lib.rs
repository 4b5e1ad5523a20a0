//! Path resolution for code emitted by gridnode derives.
//!
//! A derived impl names traits from `gridnode_engine`. Workload crates may
//! depend on the engine directly, under a renamed key, or only through the
//! `gridnode` facade, so the emitted path is looked up in the consuming
//! manifest when the macro expands.

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

const ENGINE: &str = "gridnode_engine";
const FACADE: &str = "gridnode";

/// Crates that derive output can refer to.
pub enum GridnodeCrate {
    /// The provisioning engine, home of the `Workload` trait.
    Engine,
}

impl GridnodeCrate {
    fn package(&self) -> &'static str {
        match self {
            Self::Engine => ENGINE,
        }
    }
}

/// Path under which `krate` is visible to the crate being expanded.
///
/// A direct dependency wins, keeping any rename. Otherwise the facade's
/// re-export is used. If neither is declared the bare package name is
/// emitted and rustc reports the unresolved crate.
pub fn resolve_crate_path(krate: GridnodeCrate) -> TokenStream {
    let package = krate.package();
    let bare = format_ident!("{}", package);

    if let Ok(found) = crate_name(package) {
        let local = match found {
            FoundCrate::Itself => bare,
            FoundCrate::Name(name) => format_ident!("{}", name),
        };
        return quote!(#local);
    }

    match crate_name(FACADE) {
        Ok(FoundCrate::Name(facade)) => {
            let facade = format_ident!("{}", facade);
            quote!(#facade::#bare)
        }
        _ => quote!(#bare),
    }
}
