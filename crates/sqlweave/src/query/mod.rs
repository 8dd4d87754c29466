//! Query builders.
//!
//! Every builder is a consuming, chainable value. Configuration calls never
//! fail on the spot: the first problem (bad template, unknown relation,
//! `join_on` without a join, ...) is recorded on the builder, every later
//! call becomes a no-op, and rendering or execution returns that error.
//!
//! ```ignore
//! use sqlweave::{select, insert, update, delete, SqlQuery};
//!
//! let users: Vec<User> = select()
//!     .model::<User>()
//!     .where_expr("? > ?", (ident("user.age"), 18))
//!     .relation("profile")
//!     .relation("posts")
//!     .order("name ASC")
//!     .limit(20)
//!     .scan_all(&conn)
//!     .await?;
//!
//! insert().model_value(&user).exec(&conn).await?;
//! update().model_value(&user).where_pk().exec(&conn).await?;
//! delete().model_value(&user).where_pk().exec(&conn).await?;
//!
//! // Render without executing.
//! let stmt = select().model::<User>().eq("id", 1).build(&PgDialect)?;
//! ```

pub(crate) mod base;
mod delete;
mod insert;
mod select;
mod table;
mod update;

pub use delete::DeleteQuery;
pub use insert::InsertQuery;
pub use select::SelectQuery;
pub use table::{CreateTableQuery, DropTableQuery};
pub use update::UpdateQuery;

use crate::client::Conn;
use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::formatter::Formatter;
use crate::hooks::Operation;
use crate::row::Row;
use crate::schema::Model;
use crate::trace;
use crate::value::Value;
use std::time::Instant;

/// Create a SELECT query builder.
pub fn select() -> SelectQuery {
    SelectQuery::new()
}

/// Create an INSERT query builder.
pub fn insert() -> InsertQuery {
    InsertQuery::new()
}

/// Create an UPDATE query builder.
pub fn update() -> UpdateQuery {
    UpdateQuery::new()
}

/// Create a DELETE query builder.
pub fn delete() -> DeleteQuery {
    DeleteQuery::new()
}

/// `CREATE TABLE` for a model.
pub fn create_table<T: Model>() -> CreateTableQuery {
    CreateTableQuery::new::<T>()
}

/// `DROP TABLE` for a model.
pub fn drop_table<T: Model>() -> DropTableQuery {
    DropTableQuery::new::<T>()
}

/// A rendered statement: SQL text plus bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub(crate) fn from_formatter(f: Formatter<'_>) -> Self {
        let (sql, params) = f.finish();
        Self { sql, params }
    }
}

/// Base trait for all query builders: rendering for a dialect.
pub trait SqlQuery {
    /// Write the statement into a formatter.
    fn append_sql(&self, f: &mut Formatter<'_>) -> OrmResult<()>;

    /// Render SQL with placeholders and collect the parameters.
    fn build(&self, dialect: &dyn Dialect) -> OrmResult<Statement> {
        let mut f = Formatter::new(dialect);
        self.append_sql(&mut f)?;
        Ok(Statement::from_formatter(f))
    }

    /// Debug helper to get the SQL string (with placeholders).
    fn to_sql(&self, dialect: &dyn Dialect) -> OrmResult<String> {
        Ok(self.build(dialect)?.sql)
    }

    /// Render SQL with every value inlined as an escaped literal.
    fn to_inline_sql(&self, dialect: &dyn Dialect) -> OrmResult<String> {
        let mut f = Formatter::inline(dialect);
        self.append_sql(&mut f)?;
        Ok(f.finish().0)
    }
}

pub(crate) async fn query_rows<C: Conn>(
    conn: &C,
    operation: Operation,
    table: &str,
    stmt: &Statement,
) -> OrmResult<Vec<Row>> {
    trace::before_query(operation, table, &stmt.sql, stmt.params.len());
    let start = Instant::now();
    let rows = conn.query(&stmt.sql, &stmt.params).await?;
    trace::after_query(operation, table, start.elapsed(), rows.len() as u64);
    Ok(rows)
}

pub(crate) async fn exec_statement<C: Conn>(
    conn: &C,
    operation: Operation,
    table: &str,
    stmt: &Statement,
) -> OrmResult<u64> {
    trace::before_query(operation, table, &stmt.sql, stmt.params.len());
    let start = Instant::now();
    let affected = conn.execute(&stmt.sql, &stmt.params).await?;
    trace::after_query(operation, table, start.elapsed(), affected);
    Ok(affected)
}

#[cfg(all(test, feature = "derive"))]
mod tests;
