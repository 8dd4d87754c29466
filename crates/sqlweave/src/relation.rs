//! Eager loading of model relations.
//!
//! Requested relation paths are resolved into a tree of [`Join`]s. To-one
//! nodes become `LEFT JOIN`s of the parent query, with their columns aliased
//! `"<alias>__<column>"` so the row mapper can route them back. To-many nodes
//! run as one follow-up query each once the parent rows are known; relations
//! nested below a to-many node are handed to that follow-up query.

use crate::client::Conn;
use crate::error::{OrmError, OrmResult};
use crate::formatter::Formatter;
use crate::fragment::{Fragment, ident};
use crate::ident::Ident;
use crate::query::SelectQuery;
use crate::query::base::{SoftDelete, append_conds};
use crate::record::Record;
use crate::schema::{RelationDef, RelationKind, ResolvedRelation, TableMetadata, registry};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Customizes the query of a relation.
pub type ApplyFn = Arc<dyn Fn(SelectQuery) -> SelectQuery + Send + Sync>;

/// Alias of the junction table in many-to-many follow-up queries.
pub(crate) const JUNCTION_ALIAS: &str = "_junction";

/// A requested relation path and its optional query customization.
#[derive(Clone)]
pub(crate) struct RelationSpec {
    path: Vec<String>,
    apply: Option<ApplyFn>,
}

impl std::fmt::Debug for RelationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationSpec")
            .field("path", &self.path)
            .field("apply", &self.apply.is_some())
            .finish()
    }
}

impl RelationSpec {
    pub(crate) fn new(path: &str, apply: Option<ApplyFn>) -> Self {
        Self {
            path: path
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            apply,
        }
    }
}

pub(crate) struct Join {
    name: String,
    kind: RelationKind,
    def: RelationDef,
    resolved: Arc<ResolvedRelation>,
    parent: Arc<TableMetadata>,
    parent_alias: String,
    alias: String,
    /// Relation names from the root model down to this node.
    path: Vec<String>,
    /// False for `relation._`: joined, but no columns selected.
    columns: bool,
    /// Query shaped by the apply functions of a to-one relation.
    scratch: Option<SelectQuery>,
    /// Apply functions of a to-many relation.
    applies: Vec<ApplyFn>,
    children: Vec<Join>,
    /// Paths below a to-many relation, loaded by its follow-up query.
    nested: Vec<RelationSpec>,
}

/// Resolve relation paths against `table` into a join tree, in request order.
pub(crate) fn resolve_joins(
    table: &Arc<TableMetadata>,
    specs: &[RelationSpec],
) -> OrmResult<Vec<Join>> {
    let mut roots = Vec::new();
    for spec in specs {
        if spec.path.is_empty() {
            return Err(OrmError::config("empty relation path"));
        }
        insert(&mut roots, table, &table.alias, &[], &spec.path, spec.apply.as_ref())?;
    }
    Ok(roots)
}

fn insert(
    level: &mut Vec<Join>,
    parent: &Arc<TableMetadata>,
    parent_alias: &str,
    prefix: &[String],
    segments: &[String],
    apply: Option<&ApplyFn>,
) -> OrmResult<()> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(());
    };
    let relation = parent.relation(head).ok_or_else(|| {
        OrmError::config(format!(
            "{} does not have relation=\"{head}\"",
            parent.type_name
        ))
    })?;

    let idx = match level.iter().position(|j| j.name == relation.name) {
        Some(idx) => idx,
        None => {
            let resolved = relation.resolve(registry(), parent)?;
            let mut path = prefix.to_vec();
            path.push(relation.name.clone());
            level.push(Join {
                name: relation.name.clone(),
                kind: relation.kind,
                def: relation.def,
                resolved,
                parent: Arc::clone(parent),
                parent_alias: parent_alias.to_string(),
                alias: path.join("__"),
                path,
                columns: true,
                scratch: None,
                applies: Vec::new(),
                children: Vec::new(),
                nested: Vec::new(),
            });
            level.len() - 1
        }
    };
    let join = &mut level[idx];

    match rest {
        [] => join.add_apply(apply),
        [only] if only == "_" => {
            join.columns = false;
            join.add_apply(apply)
        }
        _ if join.kind.is_to_one() => {
            let target = Arc::clone(&join.resolved.target);
            let alias = join.alias.clone();
            let path = join.path.clone();
            insert(&mut join.children, &target, &alias, &path, rest, apply)
        }
        _ => {
            join.nested.push(RelationSpec {
                path: rest.to_vec(),
                apply: apply.cloned(),
            });
            Ok(())
        }
    }
}

impl Join {
    fn add_apply(&mut self, apply: Option<&ApplyFn>) -> OrmResult<()> {
        let Some(apply) = apply else {
            return Ok(());
        };
        if !self.kind.is_to_one() {
            self.applies.push(Arc::clone(apply));
            return Ok(());
        }
        let query = self.scratch.take().unwrap_or_else(|| {
            SelectQuery::for_table(Arc::clone(&self.resolved.target)).with_alias(&self.alias)
        });
        let query = apply(query);
        query.base.ensure_ok()?;
        self.scratch = Some(query);
        Ok(())
    }

    /// Aliased columns of this to-one node and its to-one descendants.
    pub(crate) fn push_columns(&self, out: &mut Vec<Fragment>) {
        if !self.kind.is_to_one() {
            return;
        }
        if self.columns {
            let target = &self.resolved.target;
            let only = self
                .scratch
                .as_ref()
                .filter(|q| q.has_columns())
                .map(SelectQuery::column_names);
            for field in &target.fields {
                if let Some(only) = &only {
                    let wanted = only.iter().any(|c| {
                        c.eq_ignore_ascii_case(&field.name) || c.eq_ignore_ascii_case(&field.column)
                    });
                    if !wanted {
                        continue;
                    }
                }
                out.push(Fragment::Safe {
                    template: "? AS ?".to_string(),
                    args: vec![
                        Fragment::Ident(Ident::qualified(&self.alias, &field.column)),
                        Fragment::Ident(Ident::name(format!("{}__{}", self.alias, field.column))),
                    ],
                });
            }
        }
        for child in &self.children {
            child.push_columns(out);
        }
    }

    /// ` LEFT JOIN "target" AS "alias" ON (...)` for this to-one node and its
    /// to-one descendants.
    pub(crate) fn append_join(&self, f: &mut Formatter<'_>, soft: SoftDelete) -> OrmResult<()> {
        if !self.kind.is_to_one() {
            return Ok(());
        }
        let target = &self.resolved.target;
        f.push_str(" LEFT JOIN ");
        f.push_ident(target.table_ident());
        f.push_str(" AS ");
        f.push_name(&self.alias);
        f.push_str(" ON (");
        let pairs = self.resolved.base_fields.iter().zip(&self.resolved.join_fields);
        for (i, (&base, &join)) in pairs.enumerate() {
            if i > 0 {
                f.push_str(" AND ");
            }
            f.push_qualified(&self.alias, &target.fields[join].column);
            f.push_str(" = ");
            f.push_qualified(&self.parent_alias, &self.parent.fields[base].column);
        }
        f.push_char(')');

        if let Some(field) = target.soft_delete_field() {
            if soft != SoftDelete::Include {
                f.push_str(" AND (");
                f.push_qualified(&self.alias, &field.column);
                f.push_str(" IS NULL)");
            }
        }

        if let Some(filter) = self.def.filter {
            let filter = Fragment::Safe {
                template: filter.to_string(),
                args: Vec::new(),
            };
            f.push_str(" AND (");
            f.with_alias(&self.alias, |f| f.push_fragment(&filter, Some(target)))?;
            f.push_char(')');
        }

        if let Some(scratch) = &self.scratch {
            if !scratch.wheres().is_empty() {
                f.push_str(" AND (");
                f.with_alias(&self.alias, |f| append_conds(f, scratch.wheres(), Some(target)))?;
                f.push_char(')');
            }
        }

        for child in &self.children {
            child.append_join(f, soft)?;
        }
        Ok(())
    }

    /// The query that loads this to-many relation for the given parent keys.
    fn follow_up(&self, keys: Vec<Vec<Value>>) -> OrmResult<SelectQuery> {
        let target = Arc::clone(&self.resolved.target);
        let mut query = SelectQuery::for_table(Arc::clone(&target));

        match &self.resolved.junction {
            Some(junction) => {
                query = query.join("JOIN ? AS ?", (ident(&junction.table), Ident::name(JUNCTION_ALIAS)));
                for (column, pk) in junction.join_columns.iter().zip(target.pk_fields()) {
                    query = query.join_on(
                        "? = ?",
                        (Ident::qualified(JUNCTION_ALIAS, column), target.column_ident(pk)),
                    );
                }
                for column in &junction.base_columns {
                    query = query.extra_column(Fragment::Safe {
                        template: "? AS ?".to_string(),
                        args: vec![
                            Fragment::Ident(Ident::qualified(JUNCTION_ALIAS, column)),
                            Fragment::Ident(Ident::name(format!("{JUNCTION_ALIAS}__{column}"))),
                        ],
                    });
                }
                let columns = junction
                    .base_columns
                    .iter()
                    .map(|c| Ident::qualified(JUNCTION_ALIAS, c))
                    .collect();
                query = query.where_in_keys(columns, keys);
            }
            None => {
                let columns = self
                    .resolved
                    .join_fields
                    .iter()
                    .map(|&i| target.column_ident(&target.fields[i]))
                    .collect();
                query = query.where_in_keys(columns, keys);
            }
        }

        if let Some(order) = self.def.order {
            for part in order.split(',') {
                query = query.order(part);
            }
        }
        if let Some(filter) = self.def.filter {
            query.base.push_where(
                false,
                Ok(Fragment::Safe {
                    template: filter.to_string(),
                    args: Vec::new(),
                }),
            );
        }
        for apply in &self.applies {
            query = apply(query);
        }

        // Distribution needs the key columns even when the caller narrowed the selection.
        if query.has_columns() && self.resolved.junction.is_none() {
            for &i in &self.resolved.join_fields {
                let field = &target.fields[i];
                let selected = query.column_names().iter().any(|c| {
                    c.eq_ignore_ascii_case(&field.name) || c.eq_ignore_ascii_case(&field.column)
                });
                if !selected {
                    query = query.column(&field.name);
                }
            }
        }

        for spec in &self.nested {
            query = query.push_relation(spec.clone());
        }
        query.base.ensure_ok()?;
        Ok(query)
    }
}

/// To-many nodes of the tree, depth-first through to-one nodes.
pub(crate) fn to_many_joins(joins: &[Join]) -> Vec<&Join> {
    let mut out = Vec::new();
    for join in joins {
        if join.kind.is_to_one() {
            out.extend(to_many_joins(&join.children));
        } else {
            out.push(join);
        }
    }
    out
}

/// Load a to-many relation for `records` and attach the children to every
/// parent. Parents without a match get an empty list; no query runs when no
/// parent has a non-NULL key.
pub(crate) async fn load_many<C: Conn>(
    conn: &C,
    join: &Join,
    records: &mut [Record],
) -> OrmResult<()> {
    let parent_path = &join.path[..join.path.len() - 1];
    let mut parents = records_at(records, parent_path);
    for parent in parents.iter_mut() {
        parent.set_many(&join.name, Vec::new());
    }
    if !join.columns {
        return Ok(());
    }

    let base_paths: Vec<&[&'static str]> = join
        .resolved
        .base_fields
        .iter()
        .map(|&i| join.parent.fields[i].path.as_slice())
        .collect();

    let mut keys = Vec::new();
    let mut seen = HashSet::new();
    for parent in parents.iter() {
        if let Some(key) = key_at(parent, &base_paths) {
            if seen.insert(hash_key(&key)) {
                keys.push(key);
            }
        }
    }
    if keys.is_empty() {
        return Ok(());
    }

    let query = join.follow_up(keys)?;
    let loaded = query.load(conn).await?;

    let target = &join.resolved.target;
    let child_key: Box<dyn Fn(&Record) -> Option<Vec<Value>> + Send + Sync> =
        match &join.resolved.junction {
            Some(junction) => {
                let names: Vec<String> = junction
                    .base_columns
                    .iter()
                    .map(|c| format!("{JUNCTION_ALIAS}__{c}"))
                    .collect();
                Box::new(move |record| {
                    names
                        .iter()
                        .map(|n| record.value(n).filter(|v| !v.is_null()).cloned())
                        .collect()
                })
            }
            None => {
                let paths: Vec<Vec<&'static str>> = join
                    .resolved
                    .join_fields
                    .iter()
                    .map(|&i| target.fields[i].path.clone())
                    .collect();
                Box::new(move |record| {
                    let paths: Vec<&[&'static str]> = paths.iter().map(Vec::as_slice).collect();
                    key_at(record, &paths)
                })
            }
        };

    let mut by_key: HashMap<Vec<KeyPart>, Vec<Record>> = HashMap::new();
    for child in loaded.records {
        if let Some(key) = child_key(&child) {
            by_key.entry(hash_key(&key)).or_default().push(child);
        }
    }

    for parent in parents {
        let Some(key) = key_at(parent, &base_paths) else {
            continue;
        };
        if let Some(children) = by_key.get(&hash_key(&key)) {
            parent.set_many(&join.name, children.clone());
        }
    }
    Ok(())
}

fn records_at<'r>(records: &'r mut [Record], path: &[String]) -> Vec<&'r mut Record> {
    let mut current: Vec<&mut Record> = records.iter_mut().collect();
    for name in path {
        current = current
            .into_iter()
            .filter_map(|r| r.child_mut(name))
            .collect();
    }
    current
}

/// The key at `paths`, `None` when any part is missing or NULL.
fn key_at(record: &Record, paths: &[&[&'static str]]) -> Option<Vec<Value>> {
    paths
        .iter()
        .map(|path| record.value_at(path).filter(|v| !v.is_null()).cloned())
        .collect()
}

/// Hashable form of a key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    Null,
}

fn hash_key(key: &[Value]) -> Vec<KeyPart> {
    key.iter()
        .map(|value| match value {
            Value::Null => KeyPart::Null,
            Value::Bool(b) => KeyPart::Int(i64::from(*b)),
            Value::Int(i) => KeyPart::Int(*i),
            Value::Float(f) => KeyPart::Text(f.to_string()),
            Value::Text(s) => KeyPart::Text(s.clone()),
            Value::Bytes(b) => KeyPart::Bytes(b.clone()),
            Value::Json(j) => KeyPart::Text(j.to_string()),
            Value::Timestamp(t) => KeyPart::Text(t.to_rfc3339()),
            Value::Uuid(u) => KeyPart::Text(u.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_paths_skip_empty_segments() {
        let spec = RelationSpec::new("author. profile..", None);
        assert_eq!(spec.path, vec!["author", "profile"]);
    }

    #[test]
    fn keys_normalize_across_value_kinds() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            hash_key(&[Value::Uuid(id)]),
            hash_key(&[Value::Text(id.to_string())])
        );
        assert_eq!(hash_key(&[Value::Bool(true)]), hash_key(&[Value::Int(1)]));
    }

    #[test]
    fn null_key_part_skips_the_parent() {
        let mut record = Record::new();
        record.set_value("a", Value::Int(1));
        record.set_value("b", Value::Null);
        let (a, b): (&[&str], &[&str]) = (&["a"], &["b"]);
        assert!(key_at(&record, &[a, b]).is_none());
        assert_eq!(key_at(&record, &[a]), Some(vec![Value::Int(1)]));
    }
}
