use super::base::{QueryBase, impl_where_methods};
use super::{SqlQuery, exec_statement, query_rows};
use crate::client::Conn;
use crate::error::{OrmError, OrmResult};
use crate::formatter::Formatter;
use crate::fragment::{Fragment, IntoArgs, ident};
use crate::hooks::{Operation, QueryEvent};
use crate::row::FromRow;
use crate::schema::Model;
use crate::value::Value;
use chrono::Utc;

/// DELETE query builder.
///
/// On a model with a soft-delete column the statement sets that column to the
/// current time instead of removing rows, unless [`Self::force_delete`] is
/// called. A delete without any WHERE condition is refused unless
/// [`Self::allow_delete_all`] is called.
#[derive(Debug, Default)]
pub struct DeleteQuery {
    pub(crate) base: QueryBase,
    force: bool,
    allow_all: bool,
    returning: Option<Fragment>,
}

impl_where_methods!(DeleteQuery);

impl DeleteQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model<T: Model>(mut self) -> Self {
        if !self.base.failed() {
            self.base.set_model::<T>();
        }
        self
    }

    /// Delete the row of `value`; combine with [`Self::where_pk`].
    pub fn model_value<T: Model>(mut self, value: &T) -> Self {
        if !self.base.failed() {
            self.base.add_model_value(value);
        }
        self
    }

    pub fn table(mut self, name: &str) -> Self {
        if !self.base.failed() {
            self.base.tables.push(Fragment::Ident(ident(name)));
        }
        self
    }

    /// Remove rows even when the model has a soft-delete column.
    pub fn force_delete(mut self) -> Self {
        self.force = true;
        self
    }

    /// Permit a DELETE without WHERE conditions.
    pub fn allow_delete_all(mut self) -> Self {
        self.allow_all = true;
        self
    }

    pub fn returning(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            self.returning = self.base.check(Fragment::safe(template, args));
        }
        self
    }

    fn is_soft(&self) -> bool {
        !self.force
            && self
                .base
                .table
                .as_ref()
                .is_some_and(|t| t.soft_delete.is_some())
    }

    fn run_hooks_before(&mut self) -> OrmResult<()> {
        self.base.ensure_ok()?;
        if let Some(hooks) = self.base.table.as_ref().and_then(|t| t.hooks) {
            hooks.before_delete(self)?;
        }
        Ok(())
    }

    fn run_hooks_after(&self, sql: &str, rows: u64) -> OrmResult<()> {
        if let Some(table) = &self.base.table {
            if let Some(hooks) = table.hooks {
                hooks.after_delete(&QueryEvent {
                    operation: Operation::Delete,
                    table: &table.name,
                    sql,
                    rows,
                })?;
            }
        }
        Ok(())
    }

    /// Run the DELETE; returns the number of affected rows.
    pub async fn exec<C: Conn>(mut self, conn: &C) -> OrmResult<u64> {
        self.run_hooks_before()?;
        let stmt = self.build(conn.dialect())?;
        let affected = exec_statement(conn, Operation::Delete, &self.base.label(), &stmt).await?;
        self.run_hooks_after(&stmt.sql, affected)?;
        Ok(affected)
    }

    /// Run the DELETE and map every `RETURNING` row.
    pub async fn fetch_all<T: FromRow, C: Conn>(mut self, conn: &C) -> OrmResult<Vec<T>> {
        self.run_hooks_before()?;
        let stmt = self.build(conn.dialect())?;
        let rows = query_rows(conn, Operation::Delete, &self.base.label(), &stmt).await?;
        self.run_hooks_after(&stmt.sql, rows.len() as u64)?;
        rows.iter().map(T::from_row).collect()
    }
}

impl SqlQuery for DeleteQuery {
    fn append_sql(&self, f: &mut Formatter<'_>) -> OrmResult<()> {
        self.base.ensure_ok()?;
        if !self.base.has_where() && !self.allow_all {
            return Err(OrmError::build(
                "delete without WHERE; call allow_delete_all() to delete every row",
            ));
        }
        let model = self.base.table.as_deref();
        let features = f.dialect().features();

        if self.is_soft() {
            let table = self.base.model()?;
            let Some(field) = table.soft_delete_field() else {
                return Err(OrmError::build("model has no soft-delete column"));
            };
            f.push_str("UPDATE ");
            self.base.append_tables(f, true)?;
            f.push_str(" SET ");
            f.push_name(&field.column);
            f.push_str(" = ");
            f.push_value(Value::Timestamp(Utc::now()));
            self.base.append_where(f, true)?;
        } else if features.delete_table_alias || model.is_none() {
            f.push_str("DELETE FROM ");
            self.base.append_tables(f, true)?;
            self.base.append_where(f, false)?;
        } else {
            f.push_str("DELETE ");
            if let Some(table) = model {
                f.push_name(self.base.alias(table));
            }
            f.push_str(" FROM ");
            self.base.append_tables(f, true)?;
            self.base.append_where(f, false)?;
        }

        if let Some(returning) = &self.returning {
            if !features.returning {
                return Err(OrmError::unsupported(f.dialect().name(), "RETURNING"));
            }
            f.push_str(" RETURNING ");
            f.push_fragment(returning, model)?;
        }
        Ok(())
    }
}
