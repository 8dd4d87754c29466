//! `#[derive(Model)]` code generation.

mod attrs;

use crate::common::syn_types::{box_inner, option_inner, vec_inner};
use attrs::{FieldAttrs, RelationAttr, parse_field_attrs, parse_model_attrs};
use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Result};

fn opt_str(value: &Option<String>) -> TokenStream {
    match value {
        Some(s) => quote! { ::core::option::Option::Some(#s) },
        None => quote! { ::core::option::Option::None },
    }
}

/// Generated pieces for one field.
struct FieldCode {
    def: Option<TokenStream>,
    read: TokenStream,
    write: Option<TokenStream>,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model can only be derived for structs",
            ));
        }
    };

    let model = parse_model_attrs(&input)?;
    let type_name = name.unraw().to_string();
    let table = opt_str(&model.table);
    let alias = opt_str(&model.alias);
    let hooks = match &model.hooks {
        Some(path) => quote! {
            ::core::option::Option::Some(&#path as &'static dyn ::sqlweave::hooks::QueryHooks)
        },
        None => quote! { ::core::option::Option::None },
    };

    let mut defs = Vec::new();
    let mut reads = Vec::new();
    let mut writes = Vec::new();
    for field in fields {
        let code = expand_field(field)?;
        defs.extend(code.def);
        reads.push(code.read);
        writes.extend(code.write);
    }

    Ok(quote! {
        impl #impl_generics ::sqlweave::schema::Model for #name #ty_generics #where_clause {
            fn model_def() -> ::sqlweave::schema::ModelDef {
                ::sqlweave::schema::ModelDef {
                    type_id: ::std::any::TypeId::of::<Self>(),
                    type_name: #type_name,
                    table: #table,
                    alias: #alias,
                    fields: ::std::vec![#(#defs),*],
                    hooks: #hooks,
                }
            }

            #[allow(unused_mut, unused_variables)]
            fn from_record(
                mut record: ::sqlweave::record::Record,
            ) -> ::sqlweave::error::OrmResult<Self> {
                ::core::result::Result::Ok(Self { #(#reads),* })
            }

            #[allow(unused_mut)]
            fn to_record(&self) -> ::sqlweave::error::OrmResult<::sqlweave::record::Record> {
                let mut record = ::sqlweave::record::Record::new();
                #(#writes)*
                ::core::result::Result::Ok(record)
            }
        }

        impl #impl_generics ::sqlweave::row::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: &::sqlweave::row::Row) -> ::sqlweave::error::OrmResult<Self> {
                ::sqlweave::__private::scan_model(row)
            }
        }
    })
}

fn options(attrs: &FieldAttrs) -> TokenStream {
    let FieldAttrs {
        pk,
        autoincrement,
        soft_delete,
        json,
        nullzero,
        unique,
        ..
    } = attrs;
    let default = opt_str(&attrs.default);
    quote! {
        ::sqlweave::schema::FieldOptions {
            pk: #pk,
            auto_increment: #autoincrement,
            soft_delete: #soft_delete,
            json: #json,
            nullzero: #nullzero,
            unique: #unique,
            default: #default,
        }
    }
}

fn expand_field(field: &syn::Field) -> Result<FieldCode> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "Model requires named fields"))?;
    let fname = ident.unraw().to_string();
    let ty = &field.ty;
    let attrs = parse_field_attrs(field)?;

    if attrs.skip {
        return Ok(FieldCode {
            def: None,
            read: quote! { #ident: ::core::default::Default::default() },
            write: None,
        });
    }

    let column = opt_str(&attrs.column);

    if let Some(kind) = attrs.relation {
        return expand_relation(field, ident, &fname, column, kind, &attrs);
    }

    if let Some(prefix) = &attrs.embed {
        let optional = option_inner(ty).is_some();
        let unwrapped = option_inner(ty).unwrap_or(ty);
        let boxed = box_inner(unwrapped).is_some();
        let target = box_inner(unwrapped).unwrap_or(unwrapped);
        let wrap = if boxed {
            quote! { .map(::std::boxed::Box::new) }
        } else {
            quote! {}
        };
        let prefix = opt_str(prefix);
        let options = options(&attrs);
        let def = quote! {
            ::sqlweave::schema::FieldDef {
                name: #fname,
                column: #column,
                kind: ::sqlweave::schema::FieldKind::Embed {
                    prefix: #prefix,
                    optional: #optional,
                    def: <#target as ::sqlweave::schema::Model>::model_def,
                },
                options: #options,
            }
        };
        let (read, write) = if optional {
            (
                quote! {
                    #ident: record
                        .take_present_child(#fname)
                        .map(|child| <#target as ::sqlweave::schema::Model>::from_record(child) #wrap)
                        .transpose()?
                },
                quote! {
                    if let ::core::option::Option::Some(value) = &self.#ident {
                        let value: &#target = value;
                        record.set_child(#fname, ::sqlweave::schema::Model::to_record(value)?);
                    }
                },
            )
        } else {
            (
                quote! {
                    #ident: <#target as ::sqlweave::schema::Model>::from_record(
                        record.take_child(#fname).unwrap_or_default(),
                    ) #wrap ?
                },
                quote! {
                    let value: &#target = &self.#ident;
                    record.set_child(#fname, ::sqlweave::schema::Model::to_record(value)?);
                },
            )
        };
        return Ok(FieldCode {
            def: Some(def),
            read,
            write: Some(write),
        });
    }

    let options = options(&attrs);
    if attrs.json {
        let nullable = option_inner(ty).is_some();
        return Ok(FieldCode {
            def: Some(quote! {
                ::sqlweave::schema::FieldDef {
                    name: #fname,
                    column: #column,
                    kind: ::sqlweave::schema::FieldKind::Scalar {
                        sql_type: ::sqlweave::value::SqlType::Json,
                        nullable: #nullable,
                    },
                    options: #options,
                }
            }),
            read: quote! { #ident: record.decode_json(#fname)? },
            write: Some(quote! {
                record.set_value(#fname, ::sqlweave::value::encode_json(&self.#ident)?);
            }),
        });
    }

    Ok(FieldCode {
        def: Some(quote! {
            ::sqlweave::schema::FieldDef {
                name: #fname,
                column: #column,
                kind: ::sqlweave::schema::FieldKind::Scalar {
                    sql_type: <#ty as ::sqlweave::value::ColumnType>::SQL_TYPE,
                    nullable: <#ty as ::sqlweave::value::ColumnType>::NULLABLE,
                },
                options: #options,
            }
        }),
        read: quote! { #ident: record.decode::<#ty>(#fname)? },
        write: Some(quote! {
            record.set_value(#fname, ::sqlweave::value::ToValue::to_value(&self.#ident));
        }),
    })
}

fn expand_relation(
    field: &syn::Field,
    ident: &syn::Ident,
    fname: &str,
    column: TokenStream,
    kind: RelationAttr,
    attrs: &FieldAttrs,
) -> Result<FieldCode> {
    let ty = &field.ty;
    let (target, boxed) = if kind.is_to_many() {
        let target = vec_inner(ty).ok_or_else(|| {
            syn::Error::new_spanned(ty, "to-many relation fields must be Vec<T>")
        })?;
        (target, false)
    } else {
        let inner = option_inner(ty).ok_or_else(|| {
            syn::Error::new_spanned(
                ty,
                "to-one relation fields must be Option<T> or Option<Box<T>>",
            )
        })?;
        match box_inner(inner) {
            Some(target) => (target, true),
            None => (inner, false),
        }
    };

    let variant = syn::Ident::new(kind.variant(), proc_macro2::Span::call_site());
    let join = opt_str(&attrs.join);
    let m2m = opt_str(&attrs.m2m);
    let order = opt_str(&attrs.order);
    let filter = opt_str(&attrs.filter);
    let def = quote! {
        ::sqlweave::schema::FieldDef {
            name: #fname,
            column: #column,
            kind: ::sqlweave::schema::FieldKind::Relation(::sqlweave::schema::RelationDef {
                kind: ::sqlweave::schema::RelationKind::#variant,
                target: |registry: &::sqlweave::schema::Registry| registry.describe::<#target>(),
                join: #join,
                m2m: #m2m,
                order: #order,
                filter: #filter,
            }),
            options: ::core::default::Default::default(),
        }
    };

    let read = if kind.is_to_many() {
        quote! {
            #ident: record
                .take_many(#fname)
                .into_iter()
                .map(<#target as ::sqlweave::schema::Model>::from_record)
                .collect::<::sqlweave::error::OrmResult<_>>()?
        }
    } else if boxed {
        quote! {
            #ident: record
                .take_present_child(#fname)
                .map(|child| {
                    <#target as ::sqlweave::schema::Model>::from_record(child)
                        .map(::std::boxed::Box::new)
                })
                .transpose()?
        }
    } else {
        quote! {
            #ident: record
                .take_present_child(#fname)
                .map(<#target as ::sqlweave::schema::Model>::from_record)
                .transpose()?
        }
    };

    Ok(FieldCode {
        def: Some(def),
        read,
        write: None,
    })
}
