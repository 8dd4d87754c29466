use super::relation::Relation;
use super::{FieldKind, FieldOptions, ModelDef};
use crate::hooks::QueryHooks;
use crate::ident::Ident;
use crate::value::SqlType;
use heck::ToSnakeCase;
use std::any::TypeId;
use std::collections::HashMap;

/// A storage column of a table (embedded struct fields are flattened).
#[derive(Debug, Clone)]
pub struct Field {
    /// Dotted logical path, e.g. `address.city`.
    pub name: String,
    pub path: Vec<&'static str>,
    pub column: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub options: FieldOptions,
}

impl Field {
    pub fn is_pk(&self) -> bool {
        self.options.pk
    }
}

/// Metadata of one model type. Immutable once built.
pub struct TableMetadata {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub name: String,
    pub alias: String,
    pub fields: Vec<Field>,
    /// Indexes into `fields`.
    pub pks: Vec<usize>,
    pub soft_delete: Option<usize>,
    pub relations: Vec<Relation>,
    pub hooks: Option<&'static dyn QueryHooks>,
    table_ident: Ident,
    by_column: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl std::fmt::Debug for TableMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableMetadata")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("fields", &self.fields)
            .field("pks", &self.pks)
            .field("relations", &self.relations)
            .finish_non_exhaustive()
    }
}

impl TableMetadata {
    /// Field by column name, case-insensitive.
    pub fn field_by_column(&self, column: &str) -> Option<&Field> {
        self.field_index(column).map(|i| &self.fields[i])
    }

    pub(crate) fn field_index(&self, column: &str) -> Option<usize> {
        self.by_column
            .get(column)
            .or_else(|| self.by_column.get(&column.to_ascii_lowercase()))
            .copied()
    }

    /// Field by logical name (`address.city`) or column name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.by_name
            .get(name)
            .copied()
            .or_else(|| self.field_index(name))
            .map(|i| &self.fields[i])
    }

    /// Relation by name, case-insensitive.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn pk_fields(&self) -> impl Iterator<Item = &Field> {
        self.pks.iter().map(|&i| &self.fields[i])
    }

    pub fn soft_delete_field(&self) -> Option<&Field> {
        self.soft_delete.map(|i| &self.fields[i])
    }

    /// Quoted-on-render table identifier (`schema.table` is split on the dot).
    pub fn table_ident(&self) -> &Ident {
        &self.table_ident
    }

    pub fn alias_ident(&self) -> Ident {
        Ident::name(self.alias.clone())
    }

    /// `alias.column` identifier for a field.
    pub fn column_ident(&self, field: &Field) -> Ident {
        Ident::qualified(&self.alias, &field.column)
    }
}

/// Default table name: pluralized snake_case of the type name.
pub fn default_table_name(type_name: &str) -> String {
    pluralize(&type_name.to_snake_case())
}

/// Default alias: snake_case of the type name.
pub fn default_alias(type_name: &str) -> String {
    type_name.to_snake_case()
}

fn pluralize(word: &str) -> String {
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

pub(super) fn build(def: ModelDef) -> Result<TableMetadata, String> {
    let name = def
        .table
        .map(str::to_string)
        .unwrap_or_else(|| default_table_name(def.type_name));
    let alias = def
        .alias
        .map(str::to_string)
        .unwrap_or_else(|| default_alias(def.type_name));
    let table_ident =
        Ident::parse(&name).map_err(|e| format!("{}: invalid table name: {e}", def.type_name))?;

    let mut builder = Builder {
        type_name: def.type_name,
        fields: Vec::new(),
        relations: Vec::new(),
        visiting: vec![def.type_id],
    };
    builder.collect(&def, &[], "", true, false)?;

    let mut by_column = HashMap::with_capacity(builder.fields.len());
    let mut by_name = HashMap::with_capacity(builder.fields.len());
    for (i, field) in builder.fields.iter().enumerate() {
        if by_column.insert(field.column.to_ascii_lowercase(), i).is_some() {
            return Err(format!(
                "{}: duplicate column {:?}",
                def.type_name, field.column
            ));
        }
        by_name.insert(field.name.clone(), i);
    }

    let pks: Vec<usize> = builder
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.options.pk)
        .map(|(i, _)| i)
        .collect();

    let mut soft_delete = builder
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.options.soft_delete)
        .map(|(i, _)| i);
    let soft = soft_delete.next();
    if soft_delete.next().is_some() {
        return Err(format!("{}: more than one soft_delete field", def.type_name));
    }
    if let Some(i) = soft {
        if !builder.fields[i].nullable {
            return Err(format!(
                "{}: soft_delete field {:?} must be nullable",
                def.type_name, builder.fields[i].name
            ));
        }
    }

    let mut relation_names = std::collections::HashSet::new();
    for rel in &builder.relations {
        if by_column.contains_key(&rel.name.to_ascii_lowercase())
            || !relation_names.insert(rel.name.to_ascii_lowercase())
        {
            return Err(format!(
                "{}: relation {:?} collides with another field",
                def.type_name, rel.name
            ));
        }
    }

    tracing::trace!(
        target: "sqlweave.schema",
        model = def.type_name,
        table = %name,
        fields = builder.fields.len(),
        relations = builder.relations.len(),
        "built table metadata"
    );

    Ok(TableMetadata {
        type_id: def.type_id,
        type_name: def.type_name,
        name,
        alias,
        fields: builder.fields,
        pks,
        soft_delete: soft,
        relations: builder.relations,
        hooks: def.hooks,
        table_ident,
        by_column,
        by_name,
    })
}

struct Builder {
    type_name: &'static str,
    fields: Vec<Field>,
    relations: Vec<Relation>,
    visiting: Vec<TypeId>,
}

impl Builder {
    fn collect(
        &mut self,
        def: &ModelDef,
        path: &[&'static str],
        prefix: &str,
        top_level: bool,
        under_optional: bool,
    ) -> Result<(), String> {
        for fd in &def.fields {
            let column = fd
                .column
                .map(str::to_string)
                .unwrap_or_else(|| fd.name.to_snake_case());
            let mut field_path = path.to_vec();
            field_path.push(fd.name);

            match &fd.kind {
                FieldKind::Scalar { sql_type, nullable } => {
                    if fd.options.pk && !top_level {
                        return Err(format!(
                            "{}: primary key {:?} cannot live in an embedded struct",
                            self.type_name, fd.name
                        ));
                    }
                    self.fields.push(Field {
                        name: field_path.join("."),
                        path: field_path,
                        column: format!("{prefix}{column}"),
                        sql_type: *sql_type,
                        nullable: *nullable || under_optional,
                        options: fd.options,
                    });
                }
                FieldKind::Embed {
                    prefix: explicit,
                    def: embed_def,
                    optional,
                } => {
                    let inner = embed_def();
                    if self.visiting.contains(&inner.type_id) {
                        return Err(format!(
                            "{}: embedded struct {} embeds itself",
                            self.type_name, inner.type_name
                        ));
                    }
                    let inner_prefix = match explicit {
                        Some(p) => format!("{prefix}{p}"),
                        None => format!("{prefix}{column}__"),
                    };
                    self.visiting.push(inner.type_id);
                    self.collect(
                        &inner,
                        &field_path,
                        &inner_prefix,
                        false,
                        under_optional || *optional,
                    )?;
                    self.visiting.pop();
                }
                FieldKind::Relation(rel) => {
                    if !top_level {
                        return Err(format!(
                            "{}: relation {:?} inside an embedded struct is not supported",
                            self.type_name, fd.name
                        ));
                    }
                    self.relations.push(Relation::new(fd.name, *rel));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_rules() {
        assert_eq!(default_table_name("User"), "users");
        assert_eq!(default_table_name("BlogPost"), "blog_posts");
        assert_eq!(default_table_name("Category"), "categories");
        assert_eq!(default_table_name("Key"), "keys");
        assert_eq!(default_table_name("Address"), "addresses");
        assert_eq!(default_alias("BlogPost"), "blog_post");
    }
}
