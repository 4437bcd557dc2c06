//! Procedural macros for the `colmap` mapping library.
//!
//! `#[derive(Entity)]` inspects a struct with named fields and generates the
//! `colmap::Entity` implementation: the type key, one property descriptor per
//! field, and a materializer that reads each field through a `RowReader`.
//!
//! Property names default to the PascalCase form of the field name
//! (`user_id` -> `UserId`), so that mapping strategies see the same names a
//! class-based model would expose.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Error, Fields, Ident, LitStr, Result, Type};

use inflections::Inflect;

// --- Helpers ---

/// Helper to check if a type is an `Option<T>`.
fn is_option(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if type_path.qself.is_none() && type_path.path.leading_colon.is_none() {
            if let Some(segment) = type_path.path.segments.last() {
                return segment.ident == "Option";
            }
        }
    }
    false
}

/// Property and type names must be plain identifiers.
fn is_valid_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric())
}

fn invalid_name(kind: &str, name: &str, span: Span) -> Error {
    Error::new(
        span,
        format!(
            "Invalid {} name `{}`. Use ASCII letters, digits, or `_`, \
             starting with a letter or `_`.",
            kind, name
        ),
    )
}

/// Holds parsed metadata about a single struct field.
struct FieldMetadata {
    ident: Ident,
    ty: Type,
    property_name: String,
    /// The `name = "..."` literal when given, the field ident otherwise.
    name_span: Span,
    use_default: bool,
    is_skipped: bool,
}

/// Parses all named fields and their `#[property(...)]` attributes.
fn parse_field_metadata(input: &DeriveInput) -> Result<Vec<FieldMetadata>> {
    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => named,
            _ => {
                return Err(Error::new(
                    input.ident.span(),
                    "#[derive(Entity)] only supports structs with named fields.",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.ident.span(),
                "#[derive(Entity)] can only be used on structs.",
            ))
        }
    };

    let mut parsed = Vec::with_capacity(fields.named.len());
    for field in &fields.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let mut property_name = ident.to_string().trim_start_matches("r#").to_pascal_case();
        let mut name_span = ident.span();
        let mut use_default = false;
        let mut is_skipped = false;

        for attr in &field.attrs {
            if attr.path().is_ident("property") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        let s: LitStr = meta.value()?.parse()?;
                        property_name = s.value();
                        name_span = s.span();
                    } else if meta.path.is_ident("default") {
                        use_default = true;
                    } else if meta.path.is_ident("skip") {
                        is_skipped = true;
                    } else {
                        return Err(meta.error("expected `name = \"...\"`, `default` or `skip`"));
                    }
                    Ok(())
                })?;
            }
        }
        parsed.push(FieldMetadata {
            ident,
            ty: field.ty.clone(),
            property_name,
            name_span,
            use_default,
            is_skipped,
        });
    }
    Ok(parsed)
}

/// Parses `#[entity(name = "...", scope = "...")]`.
fn parse_entity_attrs(input: &DeriveInput) -> Result<(Option<LitStr>, Option<String>)> {
    let mut name = None;
    let mut scope = None;
    for attr in &input.attrs {
        if attr.path().is_ident("entity") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    name = Some(meta.value()?.parse::<LitStr>()?);
                } else if meta.path.is_ident("scope") {
                    let s: LitStr = meta.value()?.parse()?;
                    scope = Some(s.value());
                } else {
                    return Err(meta.error("expected `name = \"...\"` or `scope = \"...\"`"));
                }
                Ok(())
            })?;
        }
    }
    Ok((name, scope))
}

// --- `Entity` derive macro ---

#[proc_macro_derive(Entity, attributes(entity, property))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_entity(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

fn expand_entity(input: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "#[derive(Entity)] does not support generic structs.",
        ));
    }
    let fields_metadata = parse_field_metadata(input)?;
    let (name_override, scope_override) = parse_entity_attrs(input)?;

    let (type_name, type_name_span) = match name_override {
        Some(lit) => (lit.value(), lit.span()),
        None => (struct_name.to_string(), struct_name.span()),
    };
    if !is_valid_ident(&type_name) {
        return Err(invalid_name("entity", &type_name, type_name_span));
    }
    // Without an override the scope is the module the struct is declared in.
    let scope = match scope_override {
        Some(s) => quote! { #s },
        None => quote! { ::core::module_path!() },
    };

    let properties: Vec<&FieldMetadata> =
        fields_metadata.iter().filter(|f| !f.is_skipped).collect();
    for (i, f) in properties.iter().enumerate() {
        if !is_valid_ident(&f.property_name) {
            return Err(invalid_name("property", &f.property_name, f.name_span));
        }
        if properties[..i]
            .iter()
            .any(|other| other.property_name == f.property_name)
        {
            return Err(Error::new(
                f.ident.span(),
                format!(
                    "Duplicate property name `{}` on `{}`. \
                     Rename one field with #[property(name = \"...\")].",
                    f.property_name, struct_name
                ),
            ));
        }
    }

    let descriptors: Vec<_> = properties
        .iter()
        .map(|f| {
            let name = &f.property_name;
            let ty = &f.ty;
            let has_default = f.use_default || is_option(ty);
            quote! {
                ::colmap::PropertyDescriptor::new(
                    #name,
                    <#ty as ::colmap::FromValue>::DECLARED_TYPE,
                    <Self as ::colmap::Entity>::TYPE,
                    #has_default,
                )
            }
        })
        .collect();

    let mut index = 0usize;
    let field_inits: Vec<_> = fields_metadata
        .iter()
        .map(|f| {
            let ident = &f.ident;
            if f.is_skipped {
                return quote! { #ident: ::core::default::Default::default() };
            }
            let i = index;
            index += 1;
            if f.use_default {
                quote! { #ident: reader.read_or_default(&properties[#i])? }
            } else {
                quote! { #ident: reader.read(&properties[#i])? }
            }
        })
        .collect();

    Ok(quote! {
        impl ::colmap::Entity for #struct_name {
            const TYPE: ::colmap::TypeKey = ::colmap::TypeKey::new(#scope, #type_name);
            const PROPERTIES: &'static [::colmap::PropertyDescriptor] = &[#(#descriptors),*];

            #[allow(unused_variables)]
            fn materialize(reader: &::colmap::RowReader<'_>) -> ::colmap::MapResult<Self> {
                let properties = <Self as ::colmap::Entity>::PROPERTIES;
                ::core::result::Result::Ok(Self {
                    #(#field_inits),*
                })
            }
        }
    })
}
