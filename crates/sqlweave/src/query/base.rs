//! State shared by every builder: target table, model values, CTEs and the WHERE tree.

use super::SqlQuery;
use super::select::SelectQuery;
use crate::error::{OrmError, OrmResult};
use crate::formatter::Formatter;
use crate::fragment::{Fragment, ident};
use crate::ident::Ident;
use crate::record::Record;
use crate::schema::{Field, Model, TableMetadata, registry};
use std::sync::Arc;

/// Which rows of a soft-delete model a query sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum SoftDelete {
    /// Only live rows (marker IS NULL).
    #[default]
    Exclude,
    /// Only deleted rows (marker IS NOT NULL).
    Only,
    /// No filter.
    Include,
}

#[derive(Debug, Clone)]
pub(crate) struct WherePart {
    pub(crate) or: bool,
    pub(crate) cond: Cond,
}

#[derive(Debug, Clone)]
pub(crate) enum Cond {
    Expr(Fragment),
    Group(Vec<WherePart>),
}

impl WherePart {
    fn is_empty(&self) -> bool {
        match &self.cond {
            Cond::Expr(frag) => frag.is_empty(),
            Cond::Group(parts) => parts.iter().all(WherePart::is_empty),
        }
    }
}

/// Render `(a) AND (b) OR ((c) AND (d))`.
pub(crate) fn append_conds(
    f: &mut Formatter<'_>,
    parts: &[WherePart],
    model: Option<&TableMetadata>,
) -> OrmResult<()> {
    let mut first = true;
    for part in parts.iter().filter(|p| !p.is_empty()) {
        if !first {
            f.push_str(if part.or { " OR " } else { " AND " });
        }
        first = false;
        f.push_char('(');
        match &part.cond {
            Cond::Expr(frag) => f.push_fragment(frag, model)?,
            Cond::Group(inner) => append_conds(f, inner, model)?,
        }
        f.push_char(')');
    }
    Ok(())
}

#[derive(Debug, Default)]
pub(crate) struct QueryBase {
    pub(crate) table: Option<Arc<TableMetadata>>,
    /// Replaces the model's alias (to-one relation queries).
    pub(crate) alias: Option<String>,
    /// Column values of bound model instances.
    pub(crate) records: Vec<Record>,
    /// Replaces `"table" AS "alias"` of the model.
    pub(crate) model_table: Option<Fragment>,
    pub(crate) tables: Vec<Fragment>,
    pub(crate) ctes: Vec<(String, SelectQuery)>,
    pub(crate) wheres: Vec<WherePart>,
    pub(crate) where_pk: bool,
    pub(crate) soft_delete: SoftDelete,
    pub(crate) err: Option<OrmError>,
}

impl QueryBase {
    pub(crate) fn failed(&self) -> bool {
        self.err.is_some()
    }

    /// Record the first error; later ones are dropped.
    pub(crate) fn set_err(&mut self, err: OrmError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    pub(crate) fn check<T>(&mut self, result: OrmResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.set_err(err);
                None
            }
        }
    }

    /// Fail with the recorded error, if any.
    pub(crate) fn ensure_ok(&self) -> OrmResult<()> {
        match &self.err {
            Some(err) => Err(err.replay()),
            None => Ok(()),
        }
    }

    pub(crate) fn set_model<T: Model>(&mut self) {
        if let Some(table) = self.check(registry().describe::<T>()) {
            self.table = Some(table);
        }
    }

    pub(crate) fn add_model_value<T: Model>(&mut self, value: &T) {
        self.set_model::<T>();
        if let Some(record) = self.check(value.to_record()) {
            self.records.push(record);
        }
    }

    pub(crate) fn push_where(&mut self, or: bool, fragment: OrmResult<Fragment>) {
        if let Some(frag) = self.check(fragment) {
            self.wheres.push(WherePart {
                or,
                cond: Cond::Expr(frag),
            });
        }
    }

    pub(crate) fn add_cte(&mut self, name: &str, query: SelectQuery) {
        if let Some(err) = &query.base.err {
            let err = err.replay();
            self.set_err(err);
            return;
        }
        self.ctes.push((name.to_string(), query));
    }

    /// The bound model's metadata.
    pub(crate) fn model(&self) -> OrmResult<&Arc<TableMetadata>> {
        self.table
            .as_ref()
            .ok_or_else(|| OrmError::build("query has no model"))
    }

    /// Alias the model table is rendered under.
    pub(crate) fn alias<'a>(&'a self, table: &'a TableMetadata) -> &'a str {
        self.alias.as_deref().unwrap_or(&table.alias)
    }

    /// Table name for log events.
    pub(crate) fn label(&self) -> String {
        match (&self.table, self.tables.first()) {
            (Some(table), _) => table.name.clone(),
            (None, Some(Fragment::Ident(id))) => id.last_name().unwrap_or_default().to_string(),
            _ => String::new(),
        }
    }

    /// A column reference: `"alias"."column"` for a model field, otherwise the
    /// name parsed as a (possibly dotted) identifier.
    pub(crate) fn column_ident(&self, name: &str) -> Ident {
        match self.table.as_ref().and_then(|t| t.field(name).map(|f| (t, f))) {
            Some((table, field)) => Ident::qualified(self.alias(table), &field.column),
            None => ident(name),
        }
    }

    pub(crate) fn has_tables(&self) -> bool {
        self.table.is_some() || !self.tables.is_empty()
    }

    pub(crate) fn has_where(&self) -> bool {
        self.where_pk || self.wheres.iter().any(|w| !w.is_empty())
    }

    pub(crate) fn append_with(&self, f: &mut Formatter<'_>) -> OrmResult<()> {
        if self.ctes.is_empty() {
            return Ok(());
        }
        if !f.dialect().features().cte {
            return Err(OrmError::unsupported(f.dialect().name(), "WITH"));
        }
        f.push_str("WITH ");
        for (i, (name, query)) in self.ctes.iter().enumerate() {
            if i > 0 {
                f.push_str(", ");
            }
            f.push_name(name);
            f.push_str(" AS (");
            query.append_sql(f)?;
            f.push_char(')');
        }
        f.push_char(' ');
        Ok(())
    }

    /// The model table (optionally aliased) followed by extra tables.
    pub(crate) fn append_tables(&self, f: &mut Formatter<'_>, with_alias: bool) -> OrmResult<()> {
        let model = self.table.as_deref();
        let mut first = true;
        if let Some(table) = model {
            match &self.model_table {
                Some(expr) => f.push_fragment(expr, model)?,
                None => {
                    f.push_ident(table.table_ident());
                    if with_alias {
                        f.push_str(" AS ");
                        f.push_name(self.alias(table));
                    }
                }
            }
            first = false;
        }
        for table in &self.tables {
            if !first {
                f.push_str(", ");
            }
            first = false;
            f.push_fragment(table, model)?;
        }
        if first {
            return Err(OrmError::build("query has no table"));
        }
        Ok(())
    }

    /// ` WHERE ...` from user conditions, `where_pk` and the soft-delete filter.
    pub(crate) fn append_where(&self, f: &mut Formatter<'_>, soft_delete: bool) -> OrmResult<()> {
        let model = self.table.as_deref();
        let soft = match (soft_delete, model.and_then(TableMetadata::soft_delete_field)) {
            (true, Some(field)) if self.soft_delete != SoftDelete::Include => Some(field),
            _ => None,
        };
        let user: Vec<&WherePart> = self.wheres.iter().filter(|w| !w.is_empty()).collect();
        if user.is_empty() && !self.where_pk && soft.is_none() {
            return Ok(());
        }

        f.push_str(" WHERE ");
        let mut first = true;
        if !user.is_empty() {
            let wrap = user.len() > 1 && (self.where_pk || soft.is_some());
            if wrap {
                f.push_char('(');
            }
            append_conds(f, &self.wheres, model)?;
            if wrap {
                f.push_char(')');
            }
            first = false;
        }
        if self.where_pk {
            if !first {
                f.push_str(" AND ");
            }
            first = false;
            f.push_char('(');
            self.append_pk_condition(f)?;
            f.push_char(')');
        }
        if let (Some(field), Some(table)) = (soft, model) {
            if !first {
                f.push_str(" AND ");
            }
            f.push_char('(');
            f.push_qualified(self.alias(table), &field.column);
            f.push_str(match self.soft_delete {
                SoftDelete::Only => " IS NOT NULL",
                _ => " IS NULL",
            });
            f.push_char(')');
        }
        Ok(())
    }

    /// `"a"."id" = ?` for one model value, `"a"."id" IN (?, ?)` for several
    /// and `("a"."x", "a"."y") IN ((?, ?), ...)` for composite keys.
    fn append_pk_condition(&self, f: &mut Formatter<'_>) -> OrmResult<()> {
        let table = self.model()?;
        if table.pks.is_empty() {
            return Err(OrmError::config(format!(
                "{} does not have primary keys",
                table.type_name
            )));
        }
        if self.records.is_empty() {
            return Err(OrmError::build("where_pk requires a model value"));
        }
        let pks: Vec<&Field> = table.pk_fields().collect();
        let alias = self.alias(table);

        if let [record] = self.records.as_slice() {
            for (i, pk) in pks.iter().enumerate() {
                if i > 0 {
                    f.push_str(" AND ");
                }
                f.push_qualified(alias, &pk.column);
                f.push_str(" = ");
                f.push_value(pk_value(table, pk, record)?);
            }
            return Ok(());
        }

        let composite = pks.len() > 1;
        if composite {
            f.push_char('(');
        }
        for (i, pk) in pks.iter().enumerate() {
            if i > 0 {
                f.push_str(", ");
            }
            f.push_qualified(alias, &pk.column);
        }
        if composite {
            f.push_char(')');
        }
        f.push_str(" IN (");
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                f.push_str(", ");
            }
            if composite {
                f.push_char('(');
            }
            for (j, pk) in pks.iter().enumerate() {
                if j > 0 {
                    f.push_str(", ");
                }
                f.push_value(pk_value(table, pk, record)?);
            }
            if composite {
                f.push_char(')');
            }
        }
        f.push_char(')');
        Ok(())
    }
}

fn pk_value(table: &TableMetadata, pk: &Field, record: &Record) -> OrmResult<crate::value::Value> {
    match record.value_at(&pk.path) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(OrmError::build(format!(
            "{}.{}: primary key is NULL",
            table.type_name, pk.name
        ))),
    }
}

/// WHERE helpers shared by the SELECT, UPDATE and DELETE builders.
macro_rules! impl_where_methods {
    ($ty:ty) => {
        impl $ty {
            // ==================== WHERE conditions ====================

            /// Add a WHERE condition joined with AND.
            ///
            /// The template uses `?` slots, one argument per slot.
            pub fn where_expr(mut self, template: &str, args: impl $crate::fragment::IntoArgs) -> Self {
                self.add_where(template, args);
                self
            }

            /// Add a WHERE condition joined with OR.
            pub fn where_or(mut self, template: &str, args: impl $crate::fragment::IntoArgs) -> Self {
                if !self.base.failed() {
                    let frag = $crate::fragment::Fragment::safe(template, args);
                    self.base.push_where(true, frag);
                }
                self
            }

            /// In-place variant of [`Self::where_expr`], for hooks.
            pub fn add_where(&mut self, template: &str, args: impl $crate::fragment::IntoArgs) {
                if !self.base.failed() {
                    let frag = $crate::fragment::Fragment::safe(template, args);
                    self.base.push_where(false, frag);
                }
            }

            /// Add a parenthesized group of conditions, joined with AND.
            ///
            /// Conditions added inside `build` go into the group only.
            pub fn where_group(self, build: impl FnOnce(Self) -> Self) -> Self {
                self.push_where_group(false, build)
            }

            /// Add a parenthesized group of conditions, joined with OR.
            pub fn where_or_group(self, build: impl FnOnce(Self) -> Self) -> Self {
                self.push_where_group(true, build)
            }

            fn push_where_group(mut self, or: bool, build: impl FnOnce(Self) -> Self) -> Self {
                if self.base.failed() {
                    return self;
                }
                let saved = std::mem::take(&mut self.base.wheres);
                let mut query = build(self);
                let group = std::mem::replace(&mut query.base.wheres, saved);
                query.base.wheres.push($crate::query::base::WherePart {
                    or,
                    cond: $crate::query::base::Cond::Group(group),
                });
                query
            }

            /// Filter by the primary key(s) of the bound model value(s).
            pub fn where_pk(mut self) -> Self {
                self.base.where_pk = true;
                self
            }

            /// Only soft-deleted rows.
            pub fn where_deleted(mut self) -> Self {
                self.base.soft_delete = $crate::query::base::SoftDelete::Only;
                self
            }

            /// Live and soft-deleted rows.
            pub fn where_all_with_deleted(mut self) -> Self {
                self.base.soft_delete = $crate::query::base::SoftDelete::Include;
                self
            }

            /// Add WHERE: column = value
            pub fn eq(self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.compare(column, "=", value.to_value())
            }

            /// Add WHERE: column <> value
            pub fn ne(self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.compare(column, "<>", value.to_value())
            }

            /// Add WHERE: column > value
            pub fn gt(self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.compare(column, ">", value.to_value())
            }

            /// Add WHERE: column >= value
            pub fn gte(self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.compare(column, ">=", value.to_value())
            }

            /// Add WHERE: column < value
            pub fn lt(self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.compare(column, "<", value.to_value())
            }

            /// Add WHERE: column <= value
            pub fn lte(self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.compare(column, "<=", value.to_value())
            }

            /// Add WHERE: column IN (values). An empty list matches nothing.
            pub fn in_list<V: $crate::value::ToValue>(mut self, column: &str, values: Vec<V>) -> Self {
                if !self.base.failed() {
                    let column = self.base.column_ident(column);
                    let frag = $crate::fragment::Fragment::safe(
                        "? IN (?)",
                        (column, $crate::fragment::In(values)),
                    );
                    self.base.push_where(false, frag);
                }
                self
            }

            /// Add WHERE: column IS NULL
            pub fn is_null(mut self, column: &str) -> Self {
                if !self.base.failed() {
                    let column = self.base.column_ident(column);
                    let frag = $crate::fragment::Fragment::safe("? IS NULL", (column,));
                    self.base.push_where(false, frag);
                }
                self
            }

            /// Add WHERE: column IS NOT NULL
            pub fn is_not_null(mut self, column: &str) -> Self {
                if !self.base.failed() {
                    let column = self.base.column_ident(column);
                    let frag = $crate::fragment::Fragment::safe("? IS NOT NULL", (column,));
                    self.base.push_where(false, frag);
                }
                self
            }

            fn compare(mut self, column: &str, op: &str, value: $crate::value::Value) -> Self {
                if !self.base.failed() {
                    let column = self.base.column_ident(column);
                    let frag = $crate::fragment::Fragment::safe(format!("? {op} ?"), (column, value));
                    self.base.push_where(false, frag);
                }
                self
            }
        }
    };
}

pub(crate) use impl_where_methods;
