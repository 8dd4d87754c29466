use super::base::QueryBase;
use super::select::SelectQuery;
use super::{SqlQuery, exec_statement, query_rows};
use crate::client::Conn;
use crate::error::{OrmError, OrmResult};
use crate::formatter::Formatter;
use crate::fragment::{Fragment, IntoArgs, ident};
use crate::hooks::{Operation, QueryEvent};
use crate::record::Record;
use crate::row::FromRow;
use crate::schema::{Field, Model};
use crate::value::Value;

/// INSERT query builder.
///
/// Columns come from the bound model values; [`Self::value`] overrides the
/// expression of one column (or adds a column when there is no model).
#[derive(Debug, Default)]
pub struct InsertQuery {
    base: QueryBase,
    columns: Vec<String>,
    values: Vec<(String, Fragment)>,
    on_conflict: Option<Fragment>,
    duplicate_key: bool,
    set: Vec<Fragment>,
    ignore: bool,
    returning: Option<Fragment>,
}

/// One column of the VALUES list.
enum InsertColumn<'a> {
    Field(&'a Field),
    Override(&'a str, &'a Fragment),
}

impl InsertQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one model value.
    pub fn model_value<T: Model>(mut self, value: &T) -> Self {
        if !self.base.failed() {
            self.base.add_model_value(value);
        }
        self
    }

    /// Insert several model values with one multi-row VALUES list.
    pub fn model_values<T: Model>(mut self, values: &[T]) -> Self {
        if self.base.failed() {
            return self;
        }
        self.base.set_model::<T>();
        for value in values {
            if let Some(record) = self.base.check(value.to_record()) {
                self.base.records.push(record);
            }
        }
        self
    }

    /// Insert into a table by name (with [`Self::value`] columns).
    pub fn table(mut self, name: &str) -> Self {
        if !self.base.failed() {
            self.base.tables.push(Fragment::Ident(ident(name)));
        }
        self
    }

    pub fn with(mut self, name: &str, query: SelectQuery) -> Self {
        if !self.base.failed() {
            self.base.add_cte(name, query);
        }
        self
    }

    /// Restrict the inserted model columns.
    pub fn column(mut self, name: &str) -> Self {
        self.columns.push(name.to_string());
        self
    }

    /// Set the expression of a column, e.g. `value("created_at", "now()", ())`.
    pub fn value(mut self, column: &str, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(frag) = self.base.check(Fragment::safe(template, args)) {
                self.values.retain(|(c, _)| c != column);
                self.values.push((column.to_string(), frag));
            }
        }
        self
    }

    /// `ON CONFLICT <template>`, e.g. `("(email) DO UPDATE", ())` or `("DO NOTHING", ())`.
    ///
    /// A `DO UPDATE` without [`Self::set`] updates every inserted non-key column
    /// from `EXCLUDED`.
    pub fn on_conflict(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            self.on_conflict = self.base.check(Fragment::safe(template, args));
        }
        self
    }

    /// `ON DUPLICATE KEY UPDATE` (MySQL). Without [`Self::set`] every inserted
    /// non-key column is updated from `VALUES(...)`.
    pub fn on_duplicate_key_update(mut self) -> Self {
        self.duplicate_key = true;
        self
    }

    /// Add an assignment to the conflict update, e.g. `("name = EXCLUDED.name", ())`.
    pub fn set(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(frag) = self.base.check(Fragment::safe(template, args)) {
                self.set.push(frag);
            }
        }
        self
    }

    /// Skip rows that violate a constraint (`INSERT IGNORE` or `ON CONFLICT DO NOTHING`).
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// `RETURNING <template>`, e.g. `("*", ())` or `("id", ())`.
    pub fn returning(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            self.returning = self.base.check(Fragment::safe(template, args));
        }
        self
    }

    fn insert_columns(&self) -> Vec<InsertColumn<'_>> {
        let mut out = Vec::new();
        if let Some(table) = &self.base.table {
            for field in &table.fields {
                let listed = self.columns.is_empty()
                    || self.columns.iter().any(|c| {
                        c.eq_ignore_ascii_case(&field.name) || c.eq_ignore_ascii_case(&field.column)
                    });
                if !listed {
                    continue;
                }
                match self.values.iter().find(|(c, _)| c.eq_ignore_ascii_case(&field.column)) {
                    Some((column, frag)) => out.push(InsertColumn::Override(column, frag)),
                    None => out.push(InsertColumn::Field(field)),
                }
            }
        }
        for (column, frag) in &self.values {
            let known = self
                .base
                .table
                .as_ref()
                .is_some_and(|t| t.field_by_column(column).is_some());
            if !known {
                out.push(InsertColumn::Override(column, frag));
            }
        }
        out
    }

    fn append_row(
        &self,
        f: &mut Formatter<'_>,
        columns: &[InsertColumn<'_>],
        record: Option<&Record>,
    ) -> OrmResult<()> {
        let model = self.base.table.as_deref();
        let use_default = f.dialect().features().default_keyword;
        f.push_char('(');
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                f.push_str(", ");
            }
            match column {
                InsertColumn::Override(_, frag) => f.push_fragment(frag, model)?,
                InsertColumn::Field(field) => {
                    let value = record
                        .and_then(|r| r.value_at(&field.path))
                        .cloned()
                        .unwrap_or(Value::Null);
                    let opts = &field.options;
                    if value.is_zero() && (opts.auto_increment || opts.default.is_some()) {
                        match opts.default {
                            _ if use_default => f.push_str("DEFAULT"),
                            Some(default) => f.push_str(default),
                            None => f.push_str("NULL"),
                        }
                    } else if opts.nullzero && value.is_zero() {
                        f.push_str("NULL");
                    } else {
                        f.push_value(value);
                    }
                }
            }
        }
        f.push_char(')');
        Ok(())
    }

    fn column_name<'c>(column: &'c InsertColumn<'_>) -> &'c str {
        match column {
            InsertColumn::Field(field) => &field.column,
            InsertColumn::Override(column, _) => column,
        }
    }

    fn is_key(&self, column: &InsertColumn<'_>) -> bool {
        matches!(column, InsertColumn::Field(field) if field.is_pk())
    }

    fn run_hooks_before(&mut self) -> OrmResult<()> {
        self.base.ensure_ok()?;
        if let Some(hooks) = self.base.table.as_ref().and_then(|t| t.hooks) {
            hooks.before_insert(self)?;
        }
        Ok(())
    }

    fn run_hooks_after(&self, sql: &str, rows: u64) -> OrmResult<()> {
        if let Some(table) = &self.base.table {
            if let Some(hooks) = table.hooks {
                hooks.after_insert(&QueryEvent {
                    operation: Operation::Insert,
                    table: &table.name,
                    sql,
                    rows,
                })?;
            }
        }
        Ok(())
    }

    /// Run the INSERT; returns the number of inserted rows.
    pub async fn exec<C: Conn>(mut self, conn: &C) -> OrmResult<u64> {
        self.run_hooks_before()?;
        let stmt = self.build(conn.dialect())?;
        let affected = exec_statement(conn, Operation::Insert, &self.base.label(), &stmt).await?;
        self.run_hooks_after(&stmt.sql, affected)?;
        Ok(affected)
    }

    /// Run the INSERT and map the first `RETURNING` row.
    pub async fn fetch_one<T: FromRow, C: Conn>(self, conn: &C) -> OrmResult<T> {
        self.fetch_all(conn)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found("insert returned no rows"))
    }

    /// Run the INSERT and map every `RETURNING` row.
    pub async fn fetch_all<T: FromRow, C: Conn>(mut self, conn: &C) -> OrmResult<Vec<T>> {
        self.run_hooks_before()?;
        let stmt = self.build(conn.dialect())?;
        let rows = query_rows(conn, Operation::Insert, &self.base.label(), &stmt).await?;
        self.run_hooks_after(&stmt.sql, rows.len() as u64)?;
        rows.iter().map(T::from_row).collect()
    }
}

impl SqlQuery for InsertQuery {
    fn append_sql(&self, f: &mut Formatter<'_>) -> OrmResult<()> {
        self.base.ensure_ok()?;
        let model = self.base.table.as_deref();
        let features = f.dialect().features();
        let dialect = f.dialect().name();

        self.base.append_with(f)?;
        if self.ignore && features.insert_ignore {
            f.push_str("INSERT IGNORE INTO ");
        } else {
            f.push_str("INSERT INTO ");
        }
        self.base.append_tables(f, false)?;

        let columns = self.insert_columns();
        if columns.is_empty() {
            return Err(OrmError::build("insert has no columns"));
        }
        f.push_str(" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                f.push_str(", ");
            }
            f.push_name(Self::column_name(column));
        }
        f.push_str(") VALUES ");

        if self.base.records.is_empty() {
            if model.is_some() && self.values.is_empty() {
                return Err(OrmError::build("insert has no model values"));
            }
            self.append_row(f, &columns, None)?;
        } else {
            for (i, record) in self.base.records.iter().enumerate() {
                if i > 0 {
                    f.push_str(", ");
                }
                self.append_row(f, &columns, Some(record))?;
            }
        }

        if let Some(conflict) = &self.on_conflict {
            if !features.on_conflict {
                return Err(OrmError::unsupported(dialect, "ON CONFLICT"));
            }
            f.push_str(" ON CONFLICT ");
            f.push_fragment(conflict, model)?;
            let template = match conflict {
                Fragment::Safe { template, .. } => template.trim_end().to_ascii_uppercase(),
                _ => String::new(),
            };
            if !self.set.is_empty() {
                f.push_str(" SET ");
                f.push_list(&self.set, ", ", model)?;
            } else if template.ends_with("DO UPDATE") {
                f.push_str(" SET ");
                self.append_auto_set(f, &columns, |f, column| {
                    f.push_name(column);
                    f.push_str(" = EXCLUDED.");
                    f.push_name(column);
                })?;
            }
        } else if self.ignore && !features.insert_ignore {
            if !features.on_conflict {
                return Err(OrmError::unsupported(dialect, "INSERT IGNORE"));
            }
            f.push_str(" ON CONFLICT DO NOTHING");
        }

        if self.duplicate_key {
            if !features.on_duplicate_key {
                return Err(OrmError::unsupported(dialect, "ON DUPLICATE KEY UPDATE"));
            }
            f.push_str(" ON DUPLICATE KEY UPDATE ");
            if self.set.is_empty() {
                self.append_auto_set(f, &columns, |f, column| {
                    f.push_name(column);
                    f.push_str(" = VALUES(");
                    f.push_name(column);
                    f.push_char(')');
                })?;
            } else {
                f.push_list(&self.set, ", ", model)?;
            }
        }

        if let Some(returning) = &self.returning {
            if !features.returning {
                return Err(OrmError::unsupported(dialect, "RETURNING"));
            }
            f.push_str(" RETURNING ");
            f.push_fragment(returning, model)?;
        }
        Ok(())
    }
}

impl InsertQuery {
    fn append_auto_set(
        &self,
        f: &mut Formatter<'_>,
        columns: &[InsertColumn<'_>],
        assign: impl Fn(&mut Formatter<'_>, &str),
    ) -> OrmResult<()> {
        let mut first = true;
        for column in columns.iter().filter(|c| !self.is_key(c)) {
            if !first {
                f.push_str(", ");
            }
            first = false;
            assign(f, Self::column_name(column));
        }
        if first {
            return Err(OrmError::build("conflict update has no columns to set"));
        }
        Ok(())
    }
}
