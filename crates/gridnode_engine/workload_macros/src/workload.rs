//! Derive macro for the `Workload` trait.

use darling::FromDeriveInput;
use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

/// Parsed attributes for the macro.
#[derive(FromDeriveInput)]
#[darling(attributes(workload))]
struct WorkloadArgs {
    ident: syn::Ident,
    generics: syn::Generics,

    /// Record type tag. Falls back to the struct name.
    #[darling(default)]
    kind: Option<String>,
}

pub(crate) fn derive_workload(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let args = match WorkloadArgs::from_derive_input(&input) {
        Ok(args) => args,
        Err(err) => return err.write_errors().into(),
    };

    let name = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();

    let kind = args.kind.unwrap_or_else(|| name.to_string());

    let engine = gridnode_macro_utils::resolve_crate_path(
        gridnode_macro_utils::GridnodeCrate::Engine,
    );

    let expanded = quote! {
        impl #impl_generics #engine::base::Workload for #name #ty_generics #where_clause {
            fn kind() -> &'static str {
                #kind
            }
        }
    };

    expanded.into()
}
