//! Connection trait for unified database access.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use std::future::Future;

/// A trait that unifies database connections and transactions.
///
/// Builders execute against any `Conn`, so repository code can take
/// `&impl Conn` and run unchanged inside or outside a [`Tx`](crate::Tx).
/// Implementations exist for `tokio_postgres::Client` (feature `postgres`)
/// and [`SqliteConn`](crate::driver::sqlite::SqliteConn) (feature `sqlite`).
pub trait Conn: Send + Sync {
    /// Dialect used to render statements for this connection.
    fn dialect(&self) -> &dyn Dialect;

    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Execute one or more statements without parameters (transaction control, DDL scripts).
    ///
    /// The default implementation calls [`Conn::execute`].
    fn batch_execute(&self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send {
        async move {
            self.execute(sql, &[]).await?;
            Ok(())
        }
    }

    /// Execute a query and return the **first** row.
    ///
    /// Semantics:
    /// - 0 rows: returns [`OrmError::NotFound`]
    /// - 1 or more rows: returns the first row
    fn query_one(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<Row>> + Send {
        async move {
            self.query(sql, params)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| OrmError::not_found("query returned no rows"))
        }
    }

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Option<Row>>> + Send {
        async move { Ok(self.query(sql, params).await?.into_iter().next()) }
    }
}

impl<C: Conn> Conn for &C {
    fn dialect(&self) -> &dyn Dialect {
        (**self).dialect()
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send {
        (**self).execute(sql, params)
    }

    fn batch_execute(&self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send {
        (**self).batch_execute(sql)
    }
}
