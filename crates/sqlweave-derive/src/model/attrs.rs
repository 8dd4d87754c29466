//! Attribute parsing for Model derive macro.
//!
//! Handles parsing of struct-level and field-level `#[orm(...)]` attributes.
//! Keys this crate does not know are skipped, together with their value.

use crate::common::syn_types::vec_inner;
use syn::meta::ParseNestedMeta;
use syn::{DeriveInput, LitStr, Result, Token};

/// Struct-level `#[orm(...)]`.
#[derive(Default)]
pub(super) struct ModelAttrs {
    pub table: Option<String>,
    pub alias: Option<String>,
    pub hooks: Option<syn::Path>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum RelationAttr {
    BelongsTo,
    HasOne,
    HasMany,
    ManyToMany,
}

impl RelationAttr {
    pub fn is_to_many(self) -> bool {
        matches!(self, RelationAttr::HasMany | RelationAttr::ManyToMany)
    }

    pub fn variant(self) -> &'static str {
        match self {
            RelationAttr::BelongsTo => "BelongsTo",
            RelationAttr::HasOne => "HasOne",
            RelationAttr::HasMany => "HasMany",
            RelationAttr::ManyToMany => "ManyToMany",
        }
    }
}

/// Field-level `#[orm(...)]`.
#[derive(Default)]
pub(super) struct FieldAttrs {
    pub column: Option<String>,
    pub pk: bool,
    pub autoincrement: bool,
    pub soft_delete: bool,
    pub json: bool,
    pub nullzero: bool,
    pub unique: bool,
    pub default: Option<String>,
    /// `Some(prefix)` for embedded structs.
    pub embed: Option<Option<String>>,
    pub skip: bool,
    pub relation: Option<RelationAttr>,
    pub m2m: Option<String>,
    pub join: Option<String>,
    pub order: Option<String>,
    pub filter: Option<String>,
}

fn lit_str(meta: &ParseNestedMeta) -> Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

fn skip_value(meta: &ParseNestedMeta) -> Result<()> {
    if meta.input.peek(Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let _content;
        syn::parenthesized!(_content in meta.input);
    }
    Ok(())
}

fn key(meta: &ParseNestedMeta) -> String {
    meta.path
        .get_ident()
        .map(|i| i.to_string())
        .unwrap_or_default()
}

pub(super) fn parse_model_attrs(input: &DeriveInput) -> Result<ModelAttrs> {
    let mut out = ModelAttrs::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_nested_meta(|meta| {
            match key(&meta).as_str() {
                "table" => out.table = Some(lit_str(&meta)?),
                "alias" => out.alias = Some(lit_str(&meta)?),
                "hooks" => out.hooks = Some(meta.value()?.parse()?),
                _ => skip_value(&meta)?,
            }
            Ok(())
        })?;
    }
    Ok(out)
}

pub(super) fn parse_field_attrs(field: &syn::Field) -> Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_nested_meta(|meta| {
            match key(&meta).as_str() {
                "column" => out.column = Some(lit_str(&meta)?),
                "pk" => out.pk = true,
                "autoincrement" | "auto_increment" => out.autoincrement = true,
                "soft_delete" => out.soft_delete = true,
                "json" => out.json = true,
                "nullzero" => out.nullzero = true,
                "unique" => out.unique = true,
                "default" => out.default = Some(lit_str(&meta)?),
                "embed" => {
                    let prefix = if meta.input.peek(Token![=]) {
                        Some(lit_str(&meta)?)
                    } else {
                        None
                    };
                    out.embed = Some(prefix);
                }
                "skip" => out.skip = true,
                "belongs_to" => out.relation = Some(RelationAttr::BelongsTo),
                "has_one" => out.relation = Some(RelationAttr::HasOne),
                "has_many" => out.relation = Some(RelationAttr::HasMany),
                "m2m" => {
                    out.relation = Some(RelationAttr::ManyToMany);
                    out.m2m = Some(lit_str(&meta)?);
                }
                "join" => out.join = Some(lit_str(&meta)?),
                "order" => out.order = Some(lit_str(&meta)?),
                "filter" => out.filter = Some(lit_str(&meta)?),
                _ => skip_value(&meta)?,
            }
            Ok(())
        })?;
    }

    if out.relation.is_some() && out.embed.is_some() {
        return Err(syn::Error::new_spanned(
            field,
            "a field cannot be both a relation and an embedded struct",
        ));
    }
    if out.relation.is_none() && !out.json && !out.skip && out.embed.is_none() {
        out.relation = inferred_relation(&field.ty);
    }
    Ok(out)
}

/// Untagged `Vec<T>` fields are has-many relations; `Vec<u8>` stays a bytes column.
fn inferred_relation(ty: &syn::Type) -> Option<RelationAttr> {
    let inner = vec_inner(ty)?;
    let bytes = matches!(inner, syn::Type::Path(p) if p.path.is_ident("u8"));
    (!bytes).then_some(RelationAttr::HasMany)
}
