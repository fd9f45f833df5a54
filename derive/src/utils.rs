use darling::{ast, FromDeriveInput, FromField};
use proc_macro2::TokenStream;
use syn::spanned::Spanned;
use syn::Error;

#[derive(FromDeriveInput)]
#[darling(attributes(vtk), supports(struct_named))]
pub(crate) struct Receiver {
    pub(crate) ident: syn::Ident,
    pub(crate) generics: syn::Generics,
    pub(crate) data: ast::Data<(), FieldReceiver>,
}

#[derive(FromField)]
#[darling(attributes(vtk))]
pub(crate) struct FieldReceiver {
    pub(crate) ident: Option<syn::Ident>,
    pub(crate) ty: syn::Type,
    #[darling(default)]
    pub(crate) name: Option<String>,
    #[darling(default)]
    pub(crate) components: Option<usize>,
}

/// A field ready for code generation.
pub(crate) struct ArrayField {
    pub(crate) ident: syn::Ident,
    /// the `T` of `Vec<T>`
    pub(crate) scalar: syn::Type,
    pub(crate) name: syn::LitStr,
    pub(crate) components: usize,
}

/// Parse the input into the struct name, its generics and its array fields, or
/// into the compile errors to emit.
pub(crate) fn parse_fields(
    input: &syn::DeriveInput,
) -> Result<(syn::Ident, syn::Generics, Vec<ArrayField>), TokenStream> {
    let Receiver { ident, generics, data } = Receiver::from_derive_input(input).map_err(|e| e.write_errors())?;
    let fields = data
        .take_struct()
        .ok_or_else(|| Error::new(input.span(), "can only derive for structs").into_compile_error())?;

    let mut out_fields = vec![];
    // plain loop so errors escape early with `?`
    for field in fields.fields {
        let span = field.ty.span();
        let field_ident = field
            .ident
            .ok_or_else(|| Error::new(span, "cannot derive for structs with unnamed fields").into_compile_error())?;
        let scalar = inner_type_vec(&field.ty).map_err(Error::into_compile_error)?;
        let components = field.components.unwrap_or(1);
        if components == 0 {
            return Err(Error::new(span, "`components` must be at least 1").into_compile_error());
        }
        let name = field.name.unwrap_or_else(|| field_ident.to_string());
        out_fields.push(ArrayField {
            ident: field_ident,
            scalar,
            name: syn::LitStr::new(&name, span),
            components,
        });
    }
    Ok((ident, generics, out_fields))
}

/// `T` of a `Vec<T>` field type.
fn inner_type_vec(field_type: &syn::Type) -> syn::Result<syn::Type> {
    let err = || Error::new(field_type.span(), "unhandled datatype. Only accepts Vec<T> of a vtk scalar type");
    let syn::Type::Path(path) = field_type else { return Err(err()) };
    let last = path.path.segments.last().ok_or_else(err)?;
    if last.ident != "Vec" {
        return Err(err());
    }
    match &last.arguments {
        syn::PathArguments::AngleBracketed(args) if args.args.len() == 1 => match &args.args[0] {
            syn::GenericArgument::Type(inner) => Ok(inner.clone()),
            _ => Err(err()),
        },
        _ => Err(err()),
    }
}
