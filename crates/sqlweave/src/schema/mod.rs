//! Table metadata.
//!
//! `#[derive(Model)]` emits a [`ModelDef`]: a static description of a struct's
//! fields and annotations. The [`Registry`] turns that declaration into
//! [`TableMetadata`] exactly once per type, applying the naming rules,
//! flattening embedded structs and validating primary keys and columns.
//! Relation targets are resolved lazily through the registry, so two models
//! may refer to each other.

mod registry;
mod relation;
mod table;

pub use registry::{Registry, registry};
pub use relation::{Junction, Relation, RelationKind, ResolvedRelation};
pub use table::{Field, TableMetadata};

use crate::error::OrmResult;
use crate::hooks::QueryHooks;
use crate::record::Record;
use crate::value::SqlType;
use std::any::TypeId;
use std::sync::Arc;

/// A struct that maps to a table.
///
/// Implemented by `#[derive(Model)]`.
pub trait Model: Sized + Send + Sync + 'static {
    /// Static declaration of the model.
    fn model_def() -> ModelDef;

    /// Build a value from a scanned record. Missing fields take their zero value.
    fn from_record(record: Record) -> OrmResult<Self>;

    /// Capture the column values of this instance (relations are skipped).
    fn to_record(&self) -> OrmResult<Record>;
}

/// Declaration of a model, as emitted by the derive macro.
pub struct ModelDef {
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// Explicit table name; defaults to the pluralized snake_case type name.
    pub table: Option<&'static str>,
    /// Explicit alias; defaults to the snake_case type name.
    pub alias: Option<&'static str>,
    pub fields: Vec<FieldDef>,
    pub hooks: Option<&'static dyn QueryHooks>,
}

/// Declaration of one struct field.
pub struct FieldDef {
    pub name: &'static str,
    /// Explicit column name; defaults to the snake_case field name.
    pub column: Option<&'static str>,
    pub kind: FieldKind,
    pub options: FieldOptions,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldOptions {
    pub pk: bool,
    pub auto_increment: bool,
    pub soft_delete: bool,
    pub json: bool,
    pub nullzero: bool,
    pub unique: bool,
    /// SQL default expression, written verbatim into DDL and VALUES.
    pub default: Option<&'static str>,
}

pub enum FieldKind {
    Scalar {
        sql_type: SqlType,
        nullable: bool,
    },
    /// A struct whose fields are flattened into this table.
    Embed {
        /// Column prefix; defaults to `<column>__`.
        prefix: Option<&'static str>,
        optional: bool,
        def: fn() -> ModelDef,
    },
    Relation(RelationDef),
}

/// Lookup of a relation's target metadata.
pub type TargetFn = fn(&Registry) -> OrmResult<Arc<TableMetadata>>;

#[derive(Clone, Copy)]
pub struct RelationDef {
    pub kind: RelationKind,
    pub target: TargetFn,
    /// Explicit key pairs, `"base_col=join_col[, ...]"`.
    pub join: Option<&'static str>,
    /// Junction table of a many-to-many relation.
    pub m2m: Option<&'static str>,
    /// Default ORDER BY of a to-many relation.
    pub order: Option<&'static str>,
    /// Extra condition applied to the relation (verbatim SQL).
    pub filter: Option<&'static str>,
}

impl std::fmt::Debug for RelationDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationDef")
            .field("kind", &self.kind)
            .field("join", &self.join)
            .field("m2m", &self.m2m)
            .field("order", &self.order)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
