//! sqlmint derive macro
//!
//! `#[derive(Entity)]` describes a struct to the sqlmint entity mapper.
//!
//! ```ignore
//! #[derive(Entity)]
//! #[sql(table = "t2_table")]
//! struct T2 {
//!     #[sql(column = "id", autoincr)]
//!     id: i64,
//!     f1: String,
//!     #[sql(skip)]
//!     scratch: Vec<u8>,
//! }
//!
//! #[derive(Entity)]
//! struct T4 {
//!     #[sql(flatten)]
//!     base: T2,
//!     f3: String,
//! }
//! ```
//!
//! Struct attributes: `table = "name"`, `table_fn = "path"`,
//! `table_fn_ref = "path"`. Field attributes: `column = "name"`,
//! `autoincr`, `created`, `updated`, `skip`, `flatten`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr};

#[proc_macro_derive(Entity, attributes(sql))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let type_name = ident.unraw().to_string();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "Entity can only be derived for structs",
            ));
        }
    };

    let naming = parse_struct_attrs(&input.attrs)?;

    let mut members = Vec::new();
    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        // Named fields always carry an ident
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let field_name = field_ident.unraw().to_string();

        if attrs.flatten {
            if attrs.column.is_some() || attrs.autoincr || attrs.created || attrs.updated {
                return Err(syn::Error::new_spanned(
                    field_ident,
                    "flatten cannot be combined with column options",
                ));
            }
            let ty = &field.ty;
            members.push(quote! {
                .embed(#field_name, <#ty as ::sqlmint::Entity>::schema)
            });
            continue;
        }

        let column = attrs.column.map(|c| quote! { .column(#c) });
        let autoincr = attrs.autoincr.then(|| quote! { .auto_increment() });
        let created = attrs.created.then(|| quote! { .created() });
        let updated = attrs.updated.then(|| quote! { .updated() });
        members.push(quote! {
            .field(::sqlmint::entity::FieldDef::new(#field_name) #column #autoincr #created #updated)
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::sqlmint::Entity for #ident #ty_generics #where_clause {
            fn schema() -> ::sqlmint::entity::EntitySchema {
                ::sqlmint::entity::EntitySchema::new(#type_name)
                    #(#naming)*
                    #(#members)*
            }
        }
    })
}

/// Table naming sources, in declaration order.
fn parse_struct_attrs(attrs: &[Attribute]) -> syn::Result<Vec<TokenStream2>> {
    let mut naming = Vec::new();

    for attr in attrs.iter().filter(|a| a.path().is_ident("sql")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let name: LitStr = meta.value()?.parse()?;
                if name.value().is_empty() {
                    return Err(meta.error("table name cannot be empty"));
                }
                naming.push(quote! { .table(#name) });
                Ok(())
            } else if meta.path.is_ident("table_fn") || meta.path.is_ident("table_fn_ref") {
                let shape = if meta.path.is_ident("table_fn") {
                    quote! { ::sqlmint::entity::Shape::Value }
                } else {
                    quote! { ::sqlmint::entity::Shape::Reference }
                };
                let lit: LitStr = meta.value()?.parse()?;
                let path: syn::ExprPath = lit.parse()?;
                naming.push(quote! {
                    .table_fn(#shape, || ::std::string::ToString::to_string(&#path()))
                });
                Ok(())
            } else {
                Err(meta.error("unknown sql attribute; expected table, table_fn or table_fn_ref"))
            }
        })?;
    }

    Ok(naming)
}

#[derive(Default)]
struct FieldAttrs {
    column: Option<LitStr>,
    autoincr: bool,
    created: bool,
    updated: bool,
    skip: bool,
    flatten: bool,
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("sql")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                let name: LitStr = meta.value()?.parse()?;
                if name.value().is_empty() {
                    return Err(meta.error("column name cannot be empty"));
                }
                out.column = Some(name);
            } else if meta.path.is_ident("autoincr") {
                out.autoincr = true;
            } else if meta.path.is_ident("created") {
                out.created = true;
            } else if meta.path.is_ident("updated") {
                out.updated = true;
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else if meta.path.is_ident("flatten") {
                out.flatten = true;
            } else {
                return Err(meta.error(
                    "unknown sql attribute; expected column, autoincr, created, updated, skip or flatten",
                ));
            }
            Ok(())
        })?;
    }

    Ok(out)
}
