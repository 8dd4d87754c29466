//! SQL dialects.
//!
//! A [`Dialect`] owns every piece of syntax that differs between engines:
//! identifier quoting, literal escaping, placeholders, LIMIT/OFFSET, JSON
//! encoding, DDL type names and the optional clauses an engine understands
//! (see [`Features`]). Builders never branch on a dialect's name.

mod mysql;
mod pg;
mod sqlite;

pub use mysql::{MySqlDialect, MySqlVersion};
pub use pg::PgDialect;
pub use sqlite::SqliteDialect;

use crate::transaction::TxOptions;
use crate::value::{SqlType, Value};
use std::fmt::Write as _;

/// Optional SQL constructs supported by a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// `RETURNING` on INSERT/UPDATE/DELETE
    pub returning: bool,
    /// `INSERT ... ON CONFLICT`
    pub on_conflict: bool,
    /// `INSERT ... ON DUPLICATE KEY UPDATE`
    pub on_duplicate_key: bool,
    /// `INSERT IGNORE`
    pub insert_ignore: bool,
    /// `WITH` common table expressions
    pub cte: bool,
    /// `SELECT DISTINCT ON (...)`
    pub distinct_on: bool,
    /// `FOR UPDATE` and friends
    pub lock_clause: bool,
    /// `DEFAULT` inside a VALUES list
    pub default_keyword: bool,
    /// `DELETE FROM t AS alias`
    pub delete_table_alias: bool,
    /// `CREATE TABLE IF NOT EXISTS` / `DROP TABLE IF EXISTS`
    pub table_if_exists: bool,
    /// `INTERSECT` / `EXCEPT`
    pub intersect_except: bool,
    /// Parenthesized operands of a compound select, `(SELECT ...) UNION (SELECT ...)`
    pub compound_parens: bool,
    /// Rewrite `\u0000` escapes in JSON text
    pub escape_json_nul: bool,
}

/// A SQL dialect.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    /// Short engine name (`"pg"`, `"mysql"`, `"sqlite"`).
    fn name(&self) -> &'static str;

    fn features(&self) -> Features;

    /// Character used to quote identifiers.
    fn ident_quote(&self) -> char {
        '"'
    }

    /// Write a single identifier part, doubling embedded quote characters.
    fn quote_ident(&self, name: &str, out: &mut String) {
        let q = self.ident_quote();
        out.push(q);
        for ch in name.chars() {
            if ch == q {
                out.push(q);
            }
            out.push(ch);
        }
        out.push(q);
    }

    /// Write the placeholder for the `index`-th (1-based) bound argument.
    fn placeholder(&self, index: usize, out: &mut String);

    fn append_bool(&self, value: bool, out: &mut String) {
        out.push_str(if value { "TRUE" } else { "FALSE" });
    }

    /// Write a single-quoted string literal.
    fn quote_string(&self, value: &str, out: &mut String) {
        out.push('\'');
        for ch in value.chars() {
            if ch == '\'' {
                out.push('\'');
            }
            out.push(ch);
        }
        out.push('\'');
    }

    fn append_bytes(&self, value: &[u8], out: &mut String) {
        out.push_str("X'");
        for b in value {
            let _ = write!(out, "{b:02x}");
        }
        out.push('\'');
    }

    /// Write a value as an inline literal (debug rendering).
    fn append_literal(&self, value: &Value, out: &mut String) {
        match value {
            Value::Null => out.push_str("NULL"),
            Value::Bool(b) => self.append_bool(*b, out),
            Value::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Float(f) => {
                if f.is_finite() {
                    let _ = write!(out, "{f}");
                } else {
                    self.quote_string(&f.to_string(), out);
                }
            }
            Value::Text(s) => self.quote_string(s, out),
            Value::Bytes(b) => self.append_bytes(b, out),
            Value::Json(j) => self.quote_string(&self.encode_json(&j.to_string()), out),
            Value::Timestamp(t) => {
                self.quote_string(&t.format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string(), out)
            }
            Value::Uuid(u) => self.quote_string(&u.to_string(), out),
        }
    }

    /// Encode JSON text before it is bound or inlined.
    fn encode_json(&self, json: &str) -> String {
        if self.features().escape_json_nul {
            json.replace("\\u0000", "\\\\u0000")
        } else {
            json.to_owned()
        }
    }

    /// Write the LIMIT/OFFSET tail, including the leading space.
    fn append_limit_offset(&self, limit: Option<u64>, offset: Option<u64>, out: &mut String) {
        if let Some(limit) = limit {
            let _ = write!(out, " LIMIT {limit}");
        }
        if let Some(offset) = offset {
            let _ = write!(out, " OFFSET {offset}");
        }
    }

    /// DDL type name for a column.
    fn column_type(&self, ty: SqlType, auto_increment: bool) -> &'static str;

    /// Statement that opens a transaction with the given options.
    fn begin_sql(&self, opts: &TxOptions) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(level) = opts.isolation {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(level.as_sql());
        }
        if opts.read_only {
            sql.push_str(" READ ONLY");
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::IsolationLevel;

    fn ident(d: &dyn Dialect, name: &str) -> String {
        let mut out = String::new();
        d.quote_ident(name, &mut out);
        out
    }

    fn literal(d: &dyn Dialect, v: &Value) -> String {
        let mut out = String::new();
        d.append_literal(v, &mut out);
        out
    }

    #[test]
    fn identifiers_are_quoted_per_dialect() {
        assert_eq!(ident(&PgDialect, "user"), r#""user""#);
        assert_eq!(ident(&SqliteDialect, "we\"ird"), r#""we""ird""#);
        assert_eq!(ident(&MySqlDialect::v8(), "user"), "`user`");
        assert_eq!(ident(&MySqlDialect::v8(), "a`b"), "`a``b`");
    }

    #[test]
    fn placeholders_differ() {
        let mut out = String::new();
        PgDialect.placeholder(3, &mut out);
        SqliteDialect.placeholder(3, &mut out);
        MySqlDialect::v5().placeholder(3, &mut out);
        assert_eq!(out, "$3??");
    }

    #[test]
    fn literals_escape_quotes() {
        let v = Value::Text("it's".into());
        assert_eq!(literal(&PgDialect, &v), "'it''s'");
        assert_eq!(literal(&MySqlDialect::v8(), &Value::Text(r"a\b".into())), r"'a\\b'");
        assert_eq!(literal(&SqliteDialect, &Value::Bool(true)), "1");
        assert_eq!(literal(&PgDialect, &Value::Bool(true)), "TRUE");
        assert_eq!(literal(&PgDialect, &Value::Bytes(vec![0xde, 0xad])), r"'\xdead'");
        assert_eq!(literal(&SqliteDialect, &Value::Bytes(vec![0xde, 0xad])), "X'dead'");
    }

    #[test]
    fn json_nul_handling() {
        let json = r#""\u0000world""#;
        assert_eq!(PgDialect.encode_json(json), r#""\\u0000world""#);
        assert_eq!(SqliteDialect.encode_json(json), r#""\\u0000world""#);
        assert_eq!(MySqlDialect::v8().encode_json(json), json);
    }

    #[test]
    fn offset_without_limit() {
        let mut out = String::new();
        MySqlDialect::v8().append_limit_offset(None, Some(5), &mut out);
        assert_eq!(out, " LIMIT 18446744073709551615 OFFSET 5");

        let mut out = String::new();
        SqliteDialect.append_limit_offset(None, Some(5), &mut out);
        assert_eq!(out, " LIMIT -1 OFFSET 5");

        let mut out = String::new();
        PgDialect.append_limit_offset(None, Some(5), &mut out);
        assert_eq!(out, " OFFSET 5");
    }

    #[test]
    fn mysql5_has_no_cte() {
        assert!(!MySqlDialect::v5().features().cte);
        assert!(MySqlDialect::v8().features().cte);
        assert!(PgDialect.features().distinct_on);
        assert!(!SqliteDialect.features().distinct_on);
    }

    #[test]
    fn begin_statements() {
        let opts = TxOptions::new()
            .isolation(IsolationLevel::Serializable)
            .read_only(true);
        assert_eq!(PgDialect.begin_sql(&opts), "BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY");
        assert_eq!(SqliteDialect.begin_sql(&opts), "BEGIN");
        assert_eq!(
            MySqlDialect::v8().begin_sql(&opts),
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE; START TRANSACTION READ ONLY"
        );
    }
}
