use super::{Dialect, Features};
use crate::transaction::TxOptions;
use crate::value::SqlType;
use std::fmt::Write as _;

/// Server generation targeted by [`MySqlDialect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MySqlVersion {
    V5,
    #[default]
    V8,
}

/// MySQL / MariaDB dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect {
    version: MySqlVersion,
}

impl MySqlDialect {
    pub fn new(version: MySqlVersion) -> Self {
        Self { version }
    }

    pub fn v5() -> Self {
        Self::new(MySqlVersion::V5)
    }

    pub fn v8() -> Self {
        Self::new(MySqlVersion::V8)
    }

    pub fn version(&self) -> MySqlVersion {
        self.version
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn features(&self) -> Features {
        let v8 = self.version == MySqlVersion::V8;
        Features {
            returning: false,
            on_conflict: false,
            on_duplicate_key: true,
            insert_ignore: true,
            cte: v8,
            distinct_on: false,
            lock_clause: true,
            default_keyword: true,
            delete_table_alias: false,
            table_if_exists: true,
            intersect_except: v8,
            compound_parens: true,
            escape_json_nul: false,
        }
    }

    fn ident_quote(&self) -> char {
        '`'
    }

    fn placeholder(&self, _index: usize, out: &mut String) {
        out.push('?');
    }

    fn append_bool(&self, value: bool, out: &mut String) {
        out.push(if value { '1' } else { '0' });
    }

    // Backslash is an escape character unless NO_BACKSLASH_ESCAPES is set.
    fn quote_string(&self, value: &str, out: &mut String) {
        out.push('\'');
        for ch in value.chars() {
            match ch {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                _ => out.push(ch),
            }
        }
        out.push('\'');
    }

    fn append_limit_offset(&self, limit: Option<u64>, offset: Option<u64>, out: &mut String) {
        match (limit, offset) {
            (None, Some(offset)) => {
                let _ = write!(out, " LIMIT {} OFFSET {offset}", u64::MAX);
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

    fn column_type(&self, ty: SqlType, auto_increment: bool) -> &'static str {
        match (ty, auto_increment) {
            (SqlType::SmallInt | SqlType::Integer, true) => "INT AUTO_INCREMENT",
            (SqlType::BigInt, true) => "BIGINT AUTO_INCREMENT",
            (SqlType::Boolean, _) => "BOOLEAN",
            (SqlType::SmallInt, _) => "SMALLINT",
            (SqlType::Integer, _) => "INT",
            (SqlType::BigInt, _) => "BIGINT",
            (SqlType::Real, _) => "FLOAT",
            (SqlType::Double, _) => "DOUBLE",
            (SqlType::Text, _) => "VARCHAR(255)",
            (SqlType::Bytes, _) => "BLOB",
            (SqlType::Json, _) => "JSON",
            (SqlType::Timestamp, _) => "DATETIME(6)",
            (SqlType::Date, _) => "DATE",
            (SqlType::Uuid, _) => "CHAR(36)",
        }
    }

    fn begin_sql(&self, opts: &TxOptions) -> String {
        let mut sql = String::new();
        if let Some(level) = opts.isolation {
            let _ = write!(sql, "SET TRANSACTION ISOLATION LEVEL {}; ", level.as_sql());
        }
        sql.push_str("START TRANSACTION");
        if opts.read_only {
            sql.push_str(" READ ONLY");
        }
        sql
    }
}
