//! Transactions and savepoints.
//!
//! A [`Tx`] borrows a connection, runs `BEGIN` on creation and implements
//! [`Conn`] itself, so every builder executes inside it unchanged. Savepoints
//! are nested `Tx` values over the same connection.
//!
//! Prefer the [`transaction!`](crate::transaction!) macro: it commits when the
//! block returns `Ok`, rolls back on `Err`, and also rolls back (then resumes
//! unwinding) when the block panics.
//!
//! ```ignore
//! let conn = SqliteConn::open_in_memory()?;
//!
//! sqlweave::transaction!(&conn, tx, {
//!     insert().model_value(&order).exec(&tx).await?;
//!
//!     // A failure here only undoes the savepoint.
//!     let notified = sqlweave::savepoint!(tx, sp, {
//!         insert().model_value(&notification).exec(&sp).await
//!     });
//!     if let Err(e) = notified {
//!         tracing::warn!("notification failed: {e}");
//!     }
//!     Ok(())
//! })?;
//! ```

use crate::client::Conn;
use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::row::Row;
use crate::value::Value;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for savepoint naming.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for [`Tx::begin_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// An open transaction (or savepoint) on a borrowed connection.
///
/// Finish it with [`Tx::commit`] or [`Tx::rollback`]. Dropping an unfinished
/// `Tx` (a cancelled future, an early return) sends the rollback without
/// waiting for its result, so the connection never stays inside the
/// abandoned transaction. The SQLite adapter completes it on the spot; the
/// postgres client queues it ahead of any later statement.
pub struct Tx<'c, C: Conn> {
    conn: &'c C,
    savepoint: Option<String>,
    finished: bool,
}

impl<C: Conn> std::fmt::Debug for Tx<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx")
            .field("dialect", &self.conn.dialect().name())
            .field("savepoint", &self.savepoint)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<'c, C: Conn> Tx<'c, C> {
    /// Begin a transaction with default options.
    pub async fn begin(conn: &'c C) -> OrmResult<Self> {
        Self::begin_with(conn, TxOptions::default()).await
    }

    pub async fn begin_with(conn: &'c C, opts: TxOptions) -> OrmResult<Self> {
        let sql = conn.dialect().begin_sql(&opts);
        conn.batch_execute(&sql).await?;
        tracing::debug!(target: "sqlweave.sql", sql = %sql, "transaction started");
        Ok(Self {
            conn,
            savepoint: None,
            finished: false,
        })
    }

    /// Open a savepoint inside this transaction.
    pub async fn savepoint(&self) -> OrmResult<Tx<'c, C>> {
        let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!("sqlweave_sp_{n}");
        let sql = format!("SAVEPOINT {}", self.quoted(&name));
        self.conn.batch_execute(&sql).await?;
        Ok(Tx {
            conn: self.conn,
            savepoint: Some(name),
            finished: false,
        })
    }

    /// Name of the savepoint, when this is one.
    pub fn savepoint_name(&self) -> Option<&str> {
        self.savepoint.as_deref()
    }

    pub async fn commit(mut self) -> OrmResult<()> {
        self.finished = true;
        let sql = match &self.savepoint {
            Some(name) => format!("RELEASE SAVEPOINT {}", self.quoted(name)),
            None => "COMMIT".to_string(),
        };
        self.conn.batch_execute(&sql).await
    }

    pub async fn rollback(mut self) -> OrmResult<()> {
        self.finished = true;
        let sql = self.rollback_sql();
        self.conn.batch_execute(&sql).await
    }

    fn rollback_sql(&self) -> String {
        match &self.savepoint {
            Some(name) => format!("ROLLBACK TO SAVEPOINT {}", self.quoted(name)),
            None => "ROLLBACK".to_string(),
        }
    }

    fn quoted(&self, name: &str) -> String {
        let mut out = String::new();
        self.conn.dialect().quote_ident(name, &mut out);
        out
    }
}

impl<C: Conn> Drop for Tx<'_, C> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let sql = self.rollback_sql();
        tracing::warn!(
            target: "sqlweave.sql",
            savepoint = self.savepoint.as_deref(),
            "transaction dropped without commit or rollback; rolling back"
        );
        // One poll sends the statement; the result is not awaited.
        if let Some(Err(e)) = self.conn.batch_execute(&sql).now_or_never() {
            tracing::error!(target: "sqlweave.sql", error = %e, sql = %sql, "rollback on drop failed");
        }
    }
}

impl<C: Conn> Conn for Tx<'_, C> {
    fn dialect(&self) -> &dyn Dialect {
        self.conn.dialect()
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        self.conn.query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send {
        self.conn.execute(sql, params)
    }

    fn batch_execute(&self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send {
        self.conn.batch_execute(sql)
    }
}

/// Runs the given block inside a transaction.
///
/// - Begins with [`Tx::begin`].
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`, or on panic before resuming it.
///
/// The block must evaluate to `sqlweave::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($conn:expr, $tx:ident, $body:block) => {{
        let $tx = $crate::Tx::begin($conn).await?;
        let __sqlweave_tx_result = $crate::__private::catch_unwind(async { $body }).await;
        $crate::__private::finish($tx, __sqlweave_tx_result).await
    }};
}

/// Runs the given block inside a savepoint of an open [`Tx`].
///
/// Releases on `Ok(_)`, rolls back to the savepoint on `Err(_)` or panic.
/// The outer transaction stays usable either way.
#[macro_export]
macro_rules! savepoint {
    ($tx:expr, $sp:ident, $body:block) => {{
        let $sp = ($tx).savepoint().await?;
        let __sqlweave_sp_result = $crate::__private::catch_unwind(async { $body }).await;
        $crate::__private::finish($sp, __sqlweave_sp_result).await
    }};
}

#[doc(hidden)]
pub mod macro_support {
    use super::Tx;
    use crate::client::Conn;
    use crate::error::{OrmError, OrmResult};
    use futures_util::FutureExt;
    use std::any::Any;
    use std::future::Future;
    use std::panic::AssertUnwindSafe;

    pub type Caught<T> = Result<OrmResult<T>, Box<dyn Any + Send>>;

    pub async fn catch_unwind<T, F>(body: F) -> Caught<T>
    where
        F: Future<Output = OrmResult<T>>,
    {
        AssertUnwindSafe(body).catch_unwind().await
    }

    pub async fn finish<C: Conn, T>(tx: Tx<'_, C>, result: Caught<T>) -> OrmResult<T> {
        match result {
            Ok(Ok(value)) => {
                tx.commit().await?;
                Ok(value)
            }
            Ok(Err(error)) => match tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err(OrmError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
            Err(panic) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(
                        target: "sqlweave.sql",
                        error = %rollback_err,
                        "rollback after panic failed"
                    );
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
