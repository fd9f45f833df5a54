mod from_field_data;
mod to_field_data;
mod utils;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Implement `vtk_pipeline::ToFieldData`: one array per `Vec<T>` field.
///
/// `#[vtk(name = "...")]` renames the array, `#[vtk(components = N)]` splits the
/// vector into tuples of `N` values.
#[proc_macro_derive(ToFieldData, attributes(vtk))]
pub fn derive_to_field_data(input: TokenStream) -> TokenStream {
    // Parse the input tokens into a syntax tree
    let input = parse_macro_input!(input as DeriveInput);

    to_field_data::derive(input)
        .unwrap_or_else(|errors| errors)
        .into()
}

/// Implement `vtk_pipeline::FromFieldData`, the inverse of `ToFieldData`.
#[proc_macro_derive(FromFieldData, attributes(vtk))]
pub fn derive_from_field_data(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    from_field_data::derive(input)
        .unwrap_or_else(|errors| errors)
        .into()
}
