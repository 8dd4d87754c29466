//! `rusqlite` adapter.
//!
//! SQLite calls are synchronous; [`SqliteConn`] serializes them through a
//! mutex and completes each future without yielding. This suits tests,
//! tooling and embedded use. Put a pool in front of it for real concurrency.
//!
//! ```ignore
//! let conn = SqliteConn::open_in_memory()?;
//! sqlweave::create_table::<User>().if_not_exists().exec(&conn).await?;
//! ```

use crate::client::Conn;
use crate::dialect::{Dialect, SqliteDialect};
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use chrono::SecondsFormat;
use rusqlite::types::{ToSqlOutput, ValueRef};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A single SQLite connection.
pub struct SqliteConn {
    conn: Mutex<rusqlite::Connection>,
}

impl std::fmt::Debug for SqliteConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConn").finish_non_exhaustive()
    }
}

impl SqliteConn {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> OrmResult<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| OrmError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> OrmResult<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| OrmError::Connection(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> OrmResult<MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|_| OrmError::Connection("sqlite connection mutex poisoned".to_string()))
    }

    fn query_sync(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(OrmError::from_sqlite_error)?;
        let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(OrmError::from_sqlite_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(OrmError::from_sqlite_error)? {
            let values = (0..width)
                .map(|idx| {
                    row.get_ref(idx)
                        .map(from_value_ref)
                        .map_err(OrmError::from_sqlite_error)
                })
                .collect::<OrmResult<Vec<_>>>()?;
            out.push(Row::new(Arc::clone(&columns), values));
        }
        Ok(out)
    }

    fn execute_sync(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let conn = self.lock()?;
        let affected = conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))
            .map_err(OrmError::from_sqlite_error)?;
        Ok(affected as u64)
    }

    fn batch_sync(&self, sql: &str) -> OrmResult<()> {
        self.lock()?
            .execute_batch(sql)
            .map_err(OrmError::from_sqlite_error)
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sql::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(Sql::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(Sql::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Json(j) => ToSqlOutput::Owned(Sql::Text(j.to_string())),
            Value::Timestamp(t) => {
                ToSqlOutput::Owned(Sql::Text(t.to_rfc3339_opts(SecondsFormat::Micros, true)))
            }
            Value::Uuid(u) => ToSqlOutput::Owned(Sql::Text(u.to_string())),
        })
    }
}

impl Conn for SqliteConn {
    fn dialect(&self) -> &dyn Dialect {
        &SqliteDialect
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        async move { self.query_sync(sql, params) }
    }

    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send {
        async move { self.execute_sync(sql, params) }
    }

    fn batch_execute(&self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send {
        async move { self.batch_sync(sql) }
    }
}
