use super::utils;
use proc_macro2::TokenStream;
use quote::quote;

pub fn derive(input: syn::DeriveInput) -> Result<TokenStream, TokenStream> {
    let (struct_type, generics, fields) = utils::parse_fields(&input)?;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    // `field: values, ` for every field, in declaration order
    let mut constructor_fields = quote! {};

    for field in fields {
        let ident = field.ident;
        let scalar = field.scalar;
        let name = field.name;
        let components = field.components;

        constructor_fields = quote! {
            #constructor_fields
            #ident: fields.values::<#scalar>(#name, #components)?,
        };
    }

    let expanded = quote! {
        impl #impl_generics ::vtk_pipeline::FromFieldData for #struct_type #ty_generics #where_clause {
            fn from_field_data(fields: &::vtk_pipeline::FieldData) -> ::vtk_pipeline::Result<Self> {
                Ok(Self { #constructor_fields })
            }
        }
    };

    Ok(expanded)
}
