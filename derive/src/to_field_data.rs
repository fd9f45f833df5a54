use super::utils;
use proc_macro2::TokenStream;
use quote::quote;

pub fn derive(input: syn::DeriveInput) -> Result<TokenStream, TokenStream> {
    let (struct_type, generics, fields) = utils::parse_fields(&input)?;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut body = quote! {};

    for field in fields {
        let ident = field.ident;
        let name = field.name;
        let components = field.components;

        body = quote! {
            #body
            fields.add_array(::vtk_pipeline::DataArray::from_vec(#name, #components, self.#ident.clone())?);
        }
    }

    // declare the whole trait
    let expanded = quote! {
        impl #impl_generics ::vtk_pipeline::ToFieldData for #struct_type #ty_generics #where_clause {
            fn to_field_data(&self) -> ::vtk_pipeline::Result<::vtk_pipeline::FieldData> {
                let mut fields = ::vtk_pipeline::FieldData::new();
                #body

                Ok(fields)
            }
        }
    };

    Ok(expanded)
}
