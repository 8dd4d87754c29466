use super::{Dialect, Features};
use crate::transaction::TxOptions;
use crate::value::SqlType;
use std::fmt::Write as _;

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn features(&self) -> Features {
        Features {
            returning: true,
            on_conflict: true,
            on_duplicate_key: false,
            insert_ignore: false,
            cte: true,
            distinct_on: false,
            lock_clause: false,
            default_keyword: false,
            delete_table_alias: true,
            table_if_exists: true,
            intersect_except: true,
            compound_parens: false,
            escape_json_nul: true,
        }
    }

    fn placeholder(&self, _index: usize, out: &mut String) {
        out.push('?');
    }

    fn append_bool(&self, value: bool, out: &mut String) {
        out.push(if value { '1' } else { '0' });
    }

    fn append_limit_offset(&self, limit: Option<u64>, offset: Option<u64>, out: &mut String) {
        match (limit, offset) {
            (None, Some(offset)) => {
                let _ = write!(out, " LIMIT -1 OFFSET {offset}");
            }
            (limit, offset) => {
                if let Some(limit) = limit {
                    let _ = write!(out, " LIMIT {limit}");
                }
                if let Some(offset) = offset {
                    let _ = write!(out, " OFFSET {offset}");
                }
            }
        }
    }

    // An INTEGER primary key aliases the rowid, so it auto-increments on NULL.
    fn column_type(&self, ty: SqlType, _auto_increment: bool) -> &'static str {
        match ty {
            SqlType::Boolean => "BOOLEAN",
            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "INTEGER",
            SqlType::Real | SqlType::Double => "REAL",
            SqlType::Text | SqlType::Json | SqlType::Uuid => "TEXT",
            SqlType::Bytes => "BLOB",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Date => "DATE",
        }
    }

    fn begin_sql(&self, _opts: &TxOptions) -> String {
        "BEGIN".to_string()
    }
}
