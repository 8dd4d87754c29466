use super::base::{QueryBase, impl_where_methods};
use super::select::SelectQuery;
use super::{SqlQuery, exec_statement, query_rows};
use crate::client::Conn;
use crate::error::{OrmError, OrmResult};
use crate::formatter::Formatter;
use crate::fragment::{Fragment, IntoArgs, ident};
use crate::hooks::{Operation, QueryEvent};
use crate::ident::Ident;
use crate::row::FromRow;
use crate::schema::Model;
use crate::value::{ToValue, Value};

/// UPDATE query builder.
///
/// Explicit assignments ([`Self::set`], [`Self::set_column`]) win; without
/// them every non-key column of the bound model value is written.
#[derive(Debug, Default)]
pub struct UpdateQuery {
    pub(crate) base: QueryBase,
    set: Vec<Fragment>,
    omit_zero: bool,
    returning: Option<Fragment>,
}

impl_where_methods!(UpdateQuery);

impl UpdateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model<T: Model>(mut self) -> Self {
        if !self.base.failed() {
            self.base.set_model::<T>();
        }
        self
    }

    /// Update the row of `value`; combine with [`Self::where_pk`].
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

    pub fn with(mut self, name: &str, query: SelectQuery) -> Self {
        if !self.base.failed() {
            self.base.add_cte(name, query);
        }
        self
    }

    /// Add an assignment, e.g. `("count = count + ?", (1,))`.
    pub fn set(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(frag) = self.base.check(Fragment::safe(template, args)) {
                self.set.push(frag);
            }
        }
        self
    }

    /// Add `"column" = value`.
    pub fn set_column(mut self, column: &str, value: impl ToValue) -> Self {
        if !self.base.failed() {
            let frag = Fragment::safe("? = ?", (Ident::name(column), value.to_value()));
            if let Some(frag) = self.base.check(frag) {
                self.set.push(frag);
            }
        }
        self
    }

    /// Skip zero-valued model fields when writing the model value.
    pub fn omit_zero(mut self) -> Self {
        self.omit_zero = true;
        self
    }

    pub fn returning(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            self.returning = self.base.check(Fragment::safe(template, args));
        }
        self
    }

    fn append_model_set(&self, f: &mut Formatter<'_>) -> OrmResult<()> {
        let table = self.base.model()?;
        let record = match self.base.records.as_slice() {
            [record] => record,
            [] => return Err(OrmError::build("update has no columns to set")),
            _ => {
                return Err(OrmError::build(
                    "updating several model values needs explicit set() assignments",
                ));
            }
        };
        let mut first = true;
        for field in table.fields.iter().filter(|f| !f.is_pk()) {
            let value = record.value_at(&field.path).cloned().unwrap_or(Value::Null);
            if self.omit_zero && value.is_zero() {
                continue;
            }
            if !first {
                f.push_str(", ");
            }
            first = false;
            f.push_name(&field.column);
            f.push_str(" = ");
            if field.options.nullzero && value.is_zero() {
                f.push_str("NULL");
            } else {
                f.push_value(value);
            }
        }
        if first {
            return Err(OrmError::build("update has no columns to set"));
        }
        Ok(())
    }

    fn run_hooks_before(&mut self) -> OrmResult<()> {
        self.base.ensure_ok()?;
        if let Some(hooks) = self.base.table.as_ref().and_then(|t| t.hooks) {
            hooks.before_update(self)?;
        }
        Ok(())
    }

    fn run_hooks_after(&self, sql: &str, rows: u64) -> OrmResult<()> {
        if let Some(table) = &self.base.table {
            if let Some(hooks) = table.hooks {
                hooks.after_update(&QueryEvent {
                    operation: Operation::Update,
                    table: &table.name,
                    sql,
                    rows,
                })?;
            }
        }
        Ok(())
    }

    /// Run the UPDATE; returns the number of affected rows.
    pub async fn exec<C: Conn>(mut self, conn: &C) -> OrmResult<u64> {
        self.run_hooks_before()?;
        let stmt = self.build(conn.dialect())?;
        let affected = exec_statement(conn, Operation::Update, &self.base.label(), &stmt).await?;
        self.run_hooks_after(&stmt.sql, affected)?;
        Ok(affected)
    }

    /// Run the UPDATE and map every `RETURNING` row.
    pub async fn fetch_all<T: FromRow, C: Conn>(mut self, conn: &C) -> OrmResult<Vec<T>> {
        self.run_hooks_before()?;
        let stmt = self.build(conn.dialect())?;
        let rows = query_rows(conn, Operation::Update, &self.base.label(), &stmt).await?;
        self.run_hooks_after(&stmt.sql, rows.len() as u64)?;
        rows.iter().map(T::from_row).collect()
    }
}

impl SqlQuery for UpdateQuery {
    fn append_sql(&self, f: &mut Formatter<'_>) -> OrmResult<()> {
        self.base.ensure_ok()?;
        let model = self.base.table.as_deref();

        self.base.append_with(f)?;
        f.push_str("UPDATE ");
        self.base.append_tables(f, true)?;
        f.push_str(" SET ");
        if self.set.is_empty() {
            self.append_model_set(f)?;
        } else {
            f.push_list(&self.set, ", ", model)?;
        }

        self.base.append_where(f, true)?;

        if let Some(returning) = &self.returning {
            if !f.dialect().features().returning {
                return Err(OrmError::unsupported(f.dialect().name(), "RETURNING"));
            }
            f.push_str(" RETURNING ");
            f.push_fragment(returning, model)?;
        }
        Ok(())
    }
}
