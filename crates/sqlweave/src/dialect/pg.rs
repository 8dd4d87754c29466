use super::{Dialect, Features};
use crate::value::SqlType;
use std::fmt::Write as _;

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDialect;

impl Dialect for PgDialect {
    fn name(&self) -> &'static str {
        "pg"
    }

    fn features(&self) -> Features {
        Features {
            returning: true,
            on_conflict: true,
            on_duplicate_key: false,
            insert_ignore: false,
            cte: true,
            distinct_on: true,
            lock_clause: true,
            default_keyword: true,
            delete_table_alias: true,
            table_if_exists: true,
            intersect_except: true,
            compound_parens: true,
            escape_json_nul: true,
        }
    }

    fn placeholder(&self, index: usize, out: &mut String) {
        let _ = write!(out, "${index}");
    }

    fn append_bytes(&self, value: &[u8], out: &mut String) {
        let mut hex = String::with_capacity(value.len() * 2 + 2);
        hex.push_str("\\x");
        for b in value {
            let _ = write!(hex, "{b:02x}");
        }
        self.quote_string(&hex, out);
    }

    fn column_type(&self, ty: SqlType, auto_increment: bool) -> &'static str {
        match (ty, auto_increment) {
            (SqlType::SmallInt | SqlType::Integer, true) => "SERIAL",
            (SqlType::BigInt, true) => "BIGSERIAL",
            (SqlType::Boolean, _) => "BOOLEAN",
            (SqlType::SmallInt, _) => "SMALLINT",
            (SqlType::Integer, _) => "INTEGER",
            (SqlType::BigInt, _) => "BIGINT",
            (SqlType::Real, _) => "REAL",
            (SqlType::Double, _) => "DOUBLE PRECISION",
            (SqlType::Text, _) => "VARCHAR",
            (SqlType::Bytes, _) => "BYTEA",
            (SqlType::Json, _) => "JSONB",
            (SqlType::Timestamp, _) => "TIMESTAMPTZ",
            (SqlType::Date, _) => "DATE",
            (SqlType::Uuid, _) => "UUID",
        }
    }
}
