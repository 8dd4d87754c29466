use super::registry::Registry;
use super::table::TableMetadata;
use super::RelationDef;
use crate::error::{OrmError, OrmResult};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// To-one; the target holds the key (`profile.user_id = user.id`).
    HasOne,
    /// To-one; the base holds the key (`post.author_id = author.id`).
    BelongsTo,
    /// To-many; the target holds the key.
    HasMany,
    /// To-many through a junction table.
    ManyToMany,
}

impl RelationKind {
    pub fn is_to_one(self) -> bool {
        matches!(self, RelationKind::HasOne | RelationKind::BelongsTo)
    }
}

/// A declared relation. The target is resolved on first use.
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub def: RelationDef,
    resolved: OnceLock<Result<Arc<ResolvedRelation>, String>>,
}

impl std::fmt::Debug for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Junction table of a many-to-many relation.
#[derive(Debug, Clone)]
pub struct Junction {
    pub table: String,
    /// Junction columns referencing the base keys.
    pub base_columns: Vec<String>,
    /// Junction columns referencing the target keys.
    pub join_columns: Vec<String>,
}

/// A relation with its target metadata and key columns.
#[derive(Debug)]
pub struct ResolvedRelation {
    pub target: Arc<TableMetadata>,
    /// Key fields on the base table (indexes into `base.fields`).
    pub base_fields: Vec<usize>,
    /// Key fields on the target table (indexes into `target.fields`).
    pub join_fields: Vec<usize>,
    pub junction: Option<Junction>,
}

impl Relation {
    pub(super) fn new(name: &'static str, def: RelationDef) -> Self {
        Self {
            name: name.to_string(),
            kind: def.kind,
            def,
            resolved: OnceLock::new(),
        }
    }

    /// Resolve the target and key columns. The result is cached.
    pub fn resolve(
        &self,
        registry: &Registry,
        base: &TableMetadata,
    ) -> OrmResult<Arc<ResolvedRelation>> {
        self.resolved
            .get_or_init(|| self.build(registry, base).map(Arc::new))
            .clone()
            .map_err(OrmError::Config)
    }

    fn build(&self, registry: &Registry, base: &TableMetadata) -> Result<ResolvedRelation, String> {
        let target = (self.def.target)(registry).map_err(|e| match e {
            OrmError::Config(msg) => msg,
            other => other.to_string(),
        })?;

        if self.kind == RelationKind::ManyToMany {
            return self.build_m2m(base, target);
        }

        let pairs: Vec<(String, String)> = match self.def.join {
            Some(join) => parse_join(join).map_err(|e| self.err(base, &e))?,
            None => self.default_pairs(base, &target)?,
        };

        let mut base_fields = Vec::with_capacity(pairs.len());
        let mut join_fields = Vec::with_capacity(pairs.len());
        for (base_col, join_col) in &pairs {
            base_fields.push(base.field_index(base_col).ok_or_else(|| {
                self.err(base, &format!("{} does not have column {base_col:?}", base.type_name))
            })?);
            join_fields.push(target.field_index(join_col).ok_or_else(|| {
                self.err(base, &format!("{} does not have column {join_col:?}", target.type_name))
            })?);
        }

        Ok(ResolvedRelation {
            target,
            base_fields,
            join_fields,
            junction: None,
        })
    }

    fn default_pairs(
        &self,
        base: &TableMetadata,
        target: &TableMetadata,
    ) -> Result<Vec<(String, String)>, String> {
        match self.kind {
            RelationKind::BelongsTo => {
                if target.pks.is_empty() {
                    return Err(self.err(
                        base,
                        &format!("{} has no primary key; declare join=...", target.type_name),
                    ));
                }
                Ok(target
                    .pk_fields()
                    .map(|pk| (format!("{}_{}", self.column_prefix(), pk.column), pk.column.clone()))
                    .collect())
            }
            _ => {
                if base.pks.is_empty() {
                    return Err(self.err(
                        base,
                        &format!("{} has no primary key; declare join=...", base.type_name),
                    ));
                }
                Ok(base
                    .pk_fields()
                    .map(|pk| (pk.column.clone(), format!("{}_{}", base.alias, pk.column)))
                    .collect())
            }
        }
    }

    fn build_m2m(
        &self,
        base: &TableMetadata,
        target: Arc<TableMetadata>,
    ) -> Result<ResolvedRelation, String> {
        let Some(table) = self.def.m2m else {
            return Err(self.err(base, "many-to-many relation needs a junction table"));
        };
        if base.pks.is_empty() || target.pks.is_empty() {
            return Err(self.err(base, "many-to-many relation needs primary keys on both sides"));
        }

        let junction = Junction {
            table: table.to_string(),
            base_columns: base
                .pk_fields()
                .map(|pk| format!("{}_{}", base.alias, pk.column))
                .collect(),
            join_columns: target
                .pk_fields()
                .map(|pk| format!("{}_{}", target.alias, pk.column))
                .collect(),
        };

        Ok(ResolvedRelation {
            base_fields: base.pks.clone(),
            join_fields: target.pks.clone(),
            target,
            junction: Some(junction),
        })
    }

    fn column_prefix(&self) -> String {
        heck::ToSnakeCase::to_snake_case(self.name.as_str())
    }

    fn err(&self, base: &TableMetadata, message: &str) -> String {
        format!("{}.{}: {message}", base.type_name, self.name)
    }
}

/// Parse `"a=b, c=d"` into column pairs.
fn parse_join(join: &str) -> Result<Vec<(String, String)>, String> {
    let pairs = join
        .split(',')
        .map(|pair| {
            let (base, target) = pair
                .split_once('=')
                .ok_or_else(|| format!("invalid join pair {pair:?}, expected base=join"))?;
            let (base, target) = (base.trim(), target.trim());
            if base.is_empty() || target.is_empty() {
                return Err(format!("invalid join pair {pair:?}, expected base=join"));
            }
            Ok((base.to_string(), target.to_string()))
        })
        .collect::<Result<Vec<_>, String>>()?;
    if pairs.is_empty() {
        return Err("empty join".to_string());
    }
    Ok(pairs)
}
