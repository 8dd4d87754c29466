use super::base::QueryBase;
use super::{SqlQuery, exec_statement};
use crate::client::Conn;
use crate::error::{OrmError, OrmResult};
use crate::formatter::Formatter;
use crate::hooks::Operation;
use crate::schema::Model;

/// `CREATE TABLE` for a model.
#[derive(Debug, Default)]
pub struct CreateTableQuery {
    base: QueryBase,
    if_not_exists: bool,
}

impl CreateTableQuery {
    pub fn new<T: Model>() -> Self {
        let mut query = Self::default();
        query.base.set_model::<T>();
        query
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub async fn exec<C: Conn>(&self, conn: &C) -> OrmResult<u64> {
        let stmt = self.build(conn.dialect())?;
        exec_statement(conn, Operation::Create, &self.base.label(), &stmt).await
    }
}

impl SqlQuery for CreateTableQuery {
    fn append_sql(&self, f: &mut Formatter<'_>) -> OrmResult<()> {
        self.base.ensure_ok()?;
        let table = self.base.model()?;
        let dialect = f.dialect();

        f.push_str("CREATE TABLE ");
        if self.if_not_exists {
            if !dialect.features().table_if_exists {
                return Err(OrmError::unsupported(dialect.name(), "IF NOT EXISTS"));
            }
            f.push_str("IF NOT EXISTS ");
        }
        f.push_ident(table.table_ident());
        f.push_str(" (");
        for (i, field) in table.fields.iter().enumerate() {
            if i > 0 {
                f.push_str(", ");
            }
            let opts = &field.options;
            f.push_name(&field.column);
            f.push_char(' ');
            f.push_str(dialect.column_type(field.sql_type, opts.auto_increment));
            if !field.nullable && !opts.auto_increment {
                f.push_str(" NOT NULL");
            }
            if let Some(default) = opts.default {
                f.push_str(" DEFAULT ");
                f.push_str(default);
            }
            if opts.unique {
                f.push_str(" UNIQUE");
            }
        }
        if !table.pks.is_empty() {
            f.push_str(", PRIMARY KEY (");
            for (i, pk) in table.pk_fields().enumerate() {
                if i > 0 {
                    f.push_str(", ");
                }
                f.push_name(&pk.column);
            }
            f.push_char(')');
        }
        f.push_char(')');
        Ok(())
    }
}

/// `DROP TABLE` for a model.
#[derive(Debug, Default)]
pub struct DropTableQuery {
    base: QueryBase,
    if_exists: bool,
}

impl DropTableQuery {
    pub fn new<T: Model>() -> Self {
        let mut query = Self::default();
        query.base.set_model::<T>();
        query
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub async fn exec<C: Conn>(&self, conn: &C) -> OrmResult<u64> {
        let stmt = self.build(conn.dialect())?;
        exec_statement(conn, Operation::Drop, &self.base.label(), &stmt).await
    }
}

impl SqlQuery for DropTableQuery {
    fn append_sql(&self, f: &mut Formatter<'_>) -> OrmResult<()> {
        self.base.ensure_ok()?;
        let table = self.base.model()?;
        f.push_str("DROP TABLE ");
        if self.if_exists {
            if !f.dialect().features().table_if_exists {
                return Err(OrmError::unsupported(f.dialect().name(), "IF EXISTS"));
            }
            f.push_str("IF EXISTS ");
        }
        f.push_ident(table.table_ident());
        Ok(())
    }
}
