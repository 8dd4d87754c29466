//! SQL identifier handling.
//!
//! [`Ident`] is a parsed, possibly dotted identifier (`schema.table.column`).
//! Parts may be written quoted (`"Weird.Name"` or `` `Weird.Name` ``) to keep
//! a dot inside a single part. Rendering goes through the [`Dialect`], so the
//! same identifier comes out as `"a"."b"` for PostgreSQL/SQLite and
//! `` `a`.`b` `` for MySQL.
//!
//! # Example
//! ```ignore
//! use sqlweave::Ident;
//!
//! let t = Ident::parse("public.users")?;
//! let c = Ident::parse(r#""CamelCase"."UserTable""#)?;
//! let all = Ident::parse("u.*")?;
//! # Ok::<(), sqlweave::OrmError>(())
//! ```

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    Name(String),
    /// `*`, only valid as the last part
    Star,
}

/// A SQL identifier (column, table, or schema name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    /// A single-part identifier taken verbatim (no dot splitting).
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            parts: vec![IdentPart::Name(name.into())],
        }
    }

    /// `alias.column`, both parts taken verbatim.
    pub fn qualified(alias: &str, column: &str) -> Self {
        Self {
            parts: vec![
                IdentPart::Name(alias.to_string()),
                IdentPart::Name(column.to_string()),
            ],
        }
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table.column`
    /// - Quoted: `"CamelCase"."UserTable"` (or backticks)
    /// - Star: `alias.*`
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::build("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(OrmError::build("Identifier cannot contain NUL character"));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(OrmError::build("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(OrmError::build(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }
            if matches!(parts.last(), Some(IdentPart::Star)) {
                return Err(OrmError::build("'*' must be the last identifier part"));
            }

            if let Some(&quote @ ('"' | '`')) = chars.peek() {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => {
                            if chars.peek() == Some(&quote) {
                                chars.next();
                                name.push(quote);
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(OrmError::build("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(OrmError::build("Empty quoted identifier"));
                }
                parts.push(IdentPart::Name(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' || c == '"' || c == '`' {
                    break;
                }
                name.push(c);
                chars.next();
            }
            match name.trim() {
                "" => return Err(OrmError::build("Empty identifier segment")),
                "*" => parts.push(IdentPart::Star),
                trimmed => parts.push(IdentPart::Name(trimmed.to_string())),
            }
        }

        Ok(Self { parts })
    }

    /// The last part, if it is a name.
    pub fn last_name(&self) -> Option<&str> {
        match self.parts.last() {
            Some(IdentPart::Name(n)) => Some(n),
            _ => None,
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }

    /// Render the identifier for a dialect.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> String {
        let mut out = String::new();
        self.write_sql(dialect, &mut out);
        out
    }

    pub(crate) fn write_sql(&self, dialect: &dyn Dialect, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Name(s) => dialect.quote_ident(s, out),
                IdentPart::Star => out.push('*'),
            }
        }
    }
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> OrmResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(&self)
    }
}

impl IntoIdent for &String {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(self)
    }
}
