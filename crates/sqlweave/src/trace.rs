//! `tracing` output for executed statements.
//!
//! Every statement run through a builder emits one DEBUG event on the
//! `sqlweave.sql` target before execution and one after it completes:
//!
//! ```text
//! RUST_LOG=sqlweave.sql=debug
//! ```
//!
//! Long SQL is truncated to [`max_sql_length`] bytes in the log (the statement
//! sent to the database is never truncated).

use crate::hooks::Operation;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Default truncation length for logged SQL.
pub const DEFAULT_MAX_SQL_LENGTH: usize = 2048;

static MAX_SQL_LENGTH: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_SQL_LENGTH);

/// Set the truncation length for logged SQL. `None` disables truncation.
pub fn set_max_sql_length(len: Option<usize>) {
    MAX_SQL_LENGTH.store(len.unwrap_or(usize::MAX), Ordering::Relaxed);
}

/// Current truncation length for logged SQL.
pub fn max_sql_length() -> Option<usize> {
    match MAX_SQL_LENGTH.load(Ordering::Relaxed) {
        usize::MAX => None,
        n => Some(n),
    }
}

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

fn display_sql(sql: &str) -> std::borrow::Cow<'_, str> {
    match max_sql_length() {
        Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)).into(),
        _ => sql.into(),
    }
}

pub(crate) fn before_query(operation: Operation, table: &str, sql: &str, param_count: usize) {
    if !tracing::enabled!(target: "sqlweave.sql", tracing::Level::DEBUG) {
        return;
    }
    tracing::debug!(
        target: "sqlweave.sql",
        query_type = operation.as_str(),
        table,
        param_count,
        sql = %display_sql(sql),
    );
}

pub(crate) fn after_query(operation: Operation, table: &str, elapsed: Duration, rows: u64) {
    tracing::debug!(
        target: "sqlweave.sql",
        query_type = operation.as_str(),
        table,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        rows,
        "query finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
        assert_eq!(truncate_sql_bytes("abc", 10), "abc");
    }
}
