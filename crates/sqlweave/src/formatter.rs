//! Rendering of fragments into SQL text and bound parameters.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::fragment::{Fragment, Named, Token, tokenize};
use crate::ident::Ident;
use crate::schema::TableMetadata;
use crate::value::Value;

/// Accumulates SQL text and arguments for one statement.
///
/// In the default mode every value becomes a dialect placeholder and is
/// collected into [`Formatter::finish`]'s parameter list. In inline mode
/// values are written as escaped literals instead (for logging and tests).
pub struct Formatter<'d> {
    dialect: &'d dyn Dialect,
    sql: String,
    params: Vec<Value>,
    inline: bool,
    /// Replaces the model's alias in named placeholders (relation joins).
    alias: Option<String>,
}

impl<'d> Formatter<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            params: Vec::new(),
            inline: false,
            alias: None,
        }
    }

    /// A formatter that writes values as literals.
    pub fn inline(dialect: &'d dyn Dialect) -> Self {
        Self {
            inline: true,
            ..Self::new(dialect)
        }
    }

    pub fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn push_str(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    pub fn push_char(&mut self, c: char) {
        self.sql.push(c);
    }

    pub fn push_ident(&mut self, ident: &Ident) {
        ident.write_sql(self.dialect, &mut self.sql);
    }

    /// Quote a single identifier part.
    pub fn push_name(&mut self, name: &str) {
        self.dialect.quote_ident(name, &mut self.sql);
    }

    /// `"alias"."column"`
    pub fn push_qualified(&mut self, alias: &str, column: &str) {
        self.push_name(alias);
        self.sql.push('.');
        self.push_name(column);
    }

    /// Render with `alias` standing in for the model's own alias.
    pub(crate) fn with_alias<R>(&mut self, alias: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.alias.replace(alias.to_string());
        let out = f(self);
        self.alias = saved;
        out
    }

    /// Bind a value (or inline it as a literal).
    pub fn push_value(&mut self, value: Value) {
        let value = match value {
            Value::Json(json) => Value::Text(self.dialect.encode_json(&json.to_string())),
            other => other,
        };
        if self.inline {
            self.dialect.append_literal(&value, &mut self.sql);
        } else {
            self.params.push(value);
            self.dialect.placeholder(self.params.len(), &mut self.sql);
        }
    }

    /// Render a fragment. `model` feeds the named placeholders.
    pub fn push_fragment(
        &mut self,
        fragment: &Fragment,
        model: Option<&TableMetadata>,
    ) -> OrmResult<()> {
        match fragment {
            Fragment::Safe { template, args } => self.push_template(template, args, model),
            Fragment::Unsafe(sql) => {
                self.sql.push_str(sql);
                Ok(())
            }
            Fragment::Ident(ident) => {
                self.push_ident(ident);
                Ok(())
            }
            Fragment::Value(value) => {
                self.push_value(value.clone());
                Ok(())
            }
            Fragment::List { items, sep } => self.push_list(items, sep, model),
            Fragment::Group(inner) => {
                self.sql.push('(');
                self.push_fragment(inner, model)?;
                self.sql.push(')');
                Ok(())
            }
        }
    }

    /// Render fragments separated by `sep`.
    pub fn push_list(
        &mut self,
        items: &[Fragment],
        sep: &str,
        model: Option<&TableMetadata>,
    ) -> OrmResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            self.push_fragment(item, model)?;
        }
        Ok(())
    }

    fn push_template(
        &mut self,
        template: &str,
        args: &[Fragment],
        model: Option<&TableMetadata>,
    ) -> OrmResult<()> {
        let mut args = args.iter();
        for token in tokenize(template) {
            match token {
                Token::Text(text) => self.sql.push_str(text),
                Token::Positional => {
                    let arg = args.next().ok_or_else(|| {
                        OrmError::build(format!("template {template:?} has too few arguments"))
                    })?;
                    self.push_fragment(arg, model)?;
                }
                Token::Named(named) => {
                    let table = model.ok_or_else(|| {
                        OrmError::build(format!(
                            "template {template:?} uses a model placeholder but the query has no model"
                        ))
                    })?;
                    self.push_named(named, table);
                }
            }
        }
        if args.next().is_some() {
            return Err(OrmError::build(format!(
                "template {template:?} has too many arguments"
            )));
        }
        Ok(())
    }

    fn push_named(&mut self, named: Named, table: &TableMetadata) {
        let alias = self.alias.clone().unwrap_or_else(|| table.alias.clone());
        match named {
            Named::TableName => self.push_ident(table.table_ident()),
            Named::TableAlias => self.push_name(&alias),
            Named::Pks => {
                for (i, pk) in table.pk_fields().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.push_qualified(&alias, &pk.column);
                }
            }
            Named::TableColumns => {
                for (i, field) in table.fields.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.push_qualified(&alias, &field.column);
                }
            }
            Named::Columns => {
                for (i, field) in table.fields.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.push_name(&field.column);
                }
            }
        }
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn finish(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}
