//! SQL fragments: the unit every builder clause is made of.
//!
//! A [`Fragment`] is one of:
//! - a safe template with `?` slots and one argument per slot,
//! - verbatim trusted SQL ([`Fragment::Unsafe`], also produced by [`Safe`]),
//! - an identifier (always quoted when rendered),
//! - a single bound value,
//! - a separated list or a parenthesized group of fragments.
//!
//! Templates understand `\?` (a literal question mark) and a few named
//! placeholders that expand from the query's model: `?TableName`,
//! `?TableAlias`, `?PKs`, `?TableColumns` and `?Columns`.
//!
//! ```ignore
//! use sqlweave::{In, Json, ident};
//!
//! q.where_expr("? = ?", (ident("user.name"), "alice"))
//!  .where_expr("id IN (?)", (In(vec![1, 2, 3]),))
//!  .where_expr("data = ?", (Json(&payload),));
//! ```

use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::value::{ToValue, Value};
use serde::Serialize;

/// A composable piece of SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Template with `?` slots, one argument per slot.
    Safe { template: String, args: Vec<Fragment> },
    /// Trusted SQL written verbatim.
    Unsafe(String),
    Ident(Ident),
    Value(Value),
    List {
        items: Vec<Fragment>,
        sep: &'static str,
    },
    /// Rendered as `(inner)`.
    Group(Box<Fragment>),
}

impl Fragment {
    /// Build a template fragment. Slot/argument agreement is checked by [`Fragment::check`].
    pub fn safe(template: impl Into<String>, args: impl IntoArgs) -> OrmResult<Self> {
        let frag = Fragment::Safe {
            template: template.into(),
            args: args.into_args()?,
        };
        frag.check()?;
        Ok(frag)
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Fragment::Unsafe(sql.into())
    }

    pub fn value(value: impl ToValue) -> Self {
        Fragment::Value(value.to_value())
    }

    pub fn list(items: Vec<Fragment>, sep: &'static str) -> Self {
        Fragment::List { items, sep }
    }

    pub fn group(inner: Fragment) -> Self {
        Fragment::Group(Box::new(inner))
    }

    /// Verify that every template has exactly as many arguments as positional slots.
    pub fn check(&self) -> OrmResult<()> {
        match self {
            Fragment::Safe { template, args } => {
                let slots = count_placeholders(template);
                if slots != args.len() {
                    return Err(OrmError::build(format!(
                        "template {template:?} has {slots} placeholder(s) but {} argument(s)",
                        args.len()
                    )));
                }
                args.iter().try_for_each(Fragment::check)
            }
            Fragment::List { items, .. } => items.iter().try_for_each(Fragment::check),
            Fragment::Group(inner) => inner.check(),
            Fragment::Unsafe(_) | Fragment::Ident(_) | Fragment::Value(_) => Ok(()),
        }
    }

    /// True for fragments that render to nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Fragment::Safe { template, .. } => template.trim().is_empty(),
            Fragment::Unsafe(s) => s.trim().is_empty(),
            Fragment::List { items, .. } => items.iter().all(Fragment::is_empty),
            Fragment::Group(_) | Fragment::Ident(_) | Fragment::Value(_) => false,
        }
    }
}

/// Named placeholders that expand from the query's model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Named {
    TableName,
    TableAlias,
    Pks,
    TableColumns,
    Columns,
}

impl Named {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "TableName" => Some(Named::TableName),
            "TableAlias" => Some(Named::TableAlias),
            "PKs" => Some(Named::Pks),
            "TableColumns" => Some(Named::TableColumns),
            "Columns" => Some(Named::Columns),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    Positional,
    Named(Named),
}

/// Split a template into text, positional slots and named placeholders.
pub(crate) fn tokenize(template: &str) -> Vec<Token<'_>> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'?') => {
                if start < i {
                    tokens.push(Token::Text(&template[start..i]));
                }
                tokens.push(Token::Text("?"));
                i += 2;
                start = i;
            }
            b'?' => {
                if start < i {
                    tokens.push(Token::Text(&template[start..i]));
                }
                let name_end = bytes[i + 1..]
                    .iter()
                    .position(|b| !b.is_ascii_alphabetic())
                    .map_or(bytes.len(), |p| i + 1 + p);
                match Named::from_name(&template[i + 1..name_end]) {
                    Some(named) => {
                        tokens.push(Token::Named(named));
                        i = name_end;
                    }
                    None => {
                        tokens.push(Token::Positional);
                        i += 1;
                    }
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        tokens.push(Token::Text(&template[start..]));
    }
    tokens
}

/// Number of positional `?` slots in a template.
pub fn count_placeholders(template: &str) -> usize {
    tokenize(template)
        .iter()
        .filter(|t| matches!(t, Token::Positional))
        .count()
}

/// Verbatim trusted SQL passed as a template argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Safe(pub String);

impl Safe {
    pub fn new(sql: impl Into<String>) -> Self {
        Safe(sql.into())
    }
}

/// A list argument, rendered as `?, ?, ?` (or `NULL` when empty).
#[derive(Debug, Clone, PartialEq)]
pub struct In<T>(pub Vec<T>);

/// A JSON-encoded argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

/// Shorthand for [`Ident::parse`], falling back to a single verbatim part
/// when `name` is not a well-formed dotted identifier.
pub fn ident(name: &str) -> Ident {
    Ident::parse(name).unwrap_or_else(|_| Ident::name(name))
}

/// Convert a value into a template argument.
pub trait IntoArg {
    fn into_arg(self) -> OrmResult<Fragment>;
}

impl<T: ToValue> IntoArg for T {
    fn into_arg(self) -> OrmResult<Fragment> {
        Ok(Fragment::Value(self.to_value()))
    }
}

impl IntoArg for Fragment {
    fn into_arg(self) -> OrmResult<Fragment> {
        Ok(self)
    }
}

impl IntoArg for Ident {
    fn into_arg(self) -> OrmResult<Fragment> {
        Ok(Fragment::Ident(self))
    }
}

impl IntoArg for Safe {
    fn into_arg(self) -> OrmResult<Fragment> {
        Ok(Fragment::Unsafe(self.0))
    }
}

impl<T: ToValue> IntoArg for In<T> {
    fn into_arg(self) -> OrmResult<Fragment> {
        if self.0.is_empty() {
            return Ok(Fragment::Unsafe("NULL".to_string()));
        }
        Ok(Fragment::list(
            self.0.iter().map(|v| Fragment::Value(v.to_value())).collect(),
            ", ",
        ))
    }
}

impl<T: Serialize> IntoArg for Json<T> {
    fn into_arg(self) -> OrmResult<Fragment> {
        Ok(Fragment::Value(Value::Json(serde_json::to_value(&self.0)?)))
    }
}

/// Convert a group of values into template arguments.
pub trait IntoArgs {
    fn into_args(self) -> OrmResult<Vec<Fragment>>;
}

impl IntoArgs for () {
    fn into_args(self) -> OrmResult<Vec<Fragment>> {
        Ok(Vec::new())
    }
}

impl<T: IntoArg> IntoArgs for Vec<T> {
    fn into_args(self) -> OrmResult<Vec<Fragment>> {
        self.into_iter().map(IntoArg::into_arg).collect()
    }
}

macro_rules! impl_into_args_tuple {
    ($($name:ident),+) => {
        impl<$($name: IntoArg),+> IntoArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_args(self) -> OrmResult<Vec<Fragment>> {
                let ($($name,)+) = self;
                Ok(vec![$($name.into_arg()?),+])
            }
        }
    };
}

impl_into_args_tuple!(A);
impl_into_args_tuple!(A, B);
impl_into_args_tuple!(A, B, C);
impl_into_args_tuple!(A, B, C, D);
impl_into_args_tuple!(A, B, C, D, E);
impl_into_args_tuple!(A, B, C, D, E, F);
impl_into_args_tuple!(A, B, C, D, E, F, G);
impl_into_args_tuple!(A, B, C, D, E, F, G, H);
