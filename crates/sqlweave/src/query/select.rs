use super::base::{Cond, QueryBase, WherePart, append_conds, impl_where_methods};
use super::{SqlQuery, Statement, exec_statement, query_rows};
use crate::client::Conn;
use crate::error::{OrmError, OrmResult};
use crate::formatter::Formatter;
use crate::fragment::{Fragment, IntoArgs, ident};
use crate::hooks::{Operation, QueryEvent};
use crate::ident::Ident;
use crate::mapper::ScanPlan;
use crate::record::Record;
use crate::relation::{self, ApplyFn, Join, RelationSpec};
use crate::row::{FromColumns, FromRow, Row};
use crate::schema::{Model, TableMetadata};
use crate::value::Value;
use futures_util::future::BoxFuture;
use std::any::TypeId;
use std::sync::Arc;

#[derive(Debug)]
enum Column {
    /// A column name, qualified with the model alias when it names a model field.
    Name(String),
    Expr(Fragment),
}

#[derive(Debug)]
struct JoinClause {
    join: Fragment,
    on: Vec<WherePart>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOp {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

impl SetOp {
    fn keyword(self) -> &'static str {
        match self {
            SetOp::Union => " UNION ",
            SetOp::UnionAll => " UNION ALL ",
            SetOp::Intersect => " INTERSECT ",
            SetOp::IntersectAll => " INTERSECT ALL ",
            SetOp::Except => " EXCEPT ",
            SetOp::ExceptAll => " EXCEPT ALL ",
        }
    }

    fn needs_intersect_except(self) -> bool {
        !matches!(self, SetOp::Union | SetOp::UnionAll)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Render {
    Rows,
    Count,
    /// Inner query of `SELECT count(*) FROM (...)`.
    Wrapped,
}

/// Rows produced by [`SelectQuery::load`], relations attached.
pub(crate) struct Loaded {
    pub(crate) records: Vec<Record>,
    pub(crate) sql: String,
}

/// SELECT query builder.
#[derive(Debug, Default)]
pub struct SelectQuery {
    pub(crate) base: QueryBase,
    /// `Some(empty)` is plain DISTINCT.
    distinct: Option<Vec<Fragment>>,
    columns: Option<Vec<Column>>,
    /// Rendered after the regular column list.
    extra_columns: Vec<Fragment>,
    exclude: Vec<String>,
    joins: Vec<JoinClause>,
    relations: Vec<RelationSpec>,
    group: Vec<Fragment>,
    having: Vec<Fragment>,
    order: Vec<Fragment>,
    limit: Option<u64>,
    offset: Option<u64>,
    lock: Option<Fragment>,
    set_ops: Vec<(SetOp, SelectQuery)>,
}

impl_where_methods!(SelectQuery);

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// A query over an already described table (relation follow-ups).
    pub(crate) fn for_table(table: Arc<TableMetadata>) -> Self {
        let mut query = Self::new();
        query.base.table = Some(table);
        query
    }

    /// Render the model table under `alias`.
    pub(crate) fn with_alias(mut self, alias: &str) -> Self {
        self.base.alias = Some(alias.to_string());
        self
    }

    // ==================== Sources ====================

    /// Select from the table of model `T`.
    pub fn model<T: Model>(mut self) -> Self {
        if !self.base.failed() {
            self.base.set_model::<T>();
        }
        self
    }

    /// Select from the table of `value`'s model; [`Self::where_pk`] then
    /// filters by its primary key.
    pub fn model_value<T: Model>(mut self, value: &T) -> Self {
        if !self.base.failed() {
            self.base.add_model_value(value);
        }
        self
    }

    /// Add a table by name (`"users"` or `"schema.users"`).
    pub fn table(mut self, name: &str) -> Self {
        if !self.base.failed() {
            self.base.tables.push(Fragment::Ident(ident(name)));
        }
        self
    }

    /// Add a table expression, e.g. `("generate_series(1, ?) AS s", (10,))`.
    pub fn table_expr(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(frag) = self.base.check(Fragment::safe(template, args)) {
                self.base.tables.push(frag);
            }
        }
        self
    }

    /// Replace the model's `"table" AS "alias"` with an expression.
    pub fn model_table_expr(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            self.base.model_table = self.base.check(Fragment::safe(template, args));
        }
        self
    }

    /// Add a common table expression: `WITH "name" AS (query)`.
    pub fn with(mut self, name: &str, query: SelectQuery) -> Self {
        if !self.base.failed() {
            self.base.add_cte(name, query);
        }
        self
    }

    // ==================== Columns ====================

    pub fn distinct(mut self) -> Self {
        self.distinct.get_or_insert_with(Vec::new);
        self
    }

    /// `DISTINCT ON (expr, ...)`; PostgreSQL only.
    pub fn distinct_on(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(frag) = self.base.check(Fragment::safe(template, args)) {
                self.distinct.get_or_insert_with(Vec::new).push(frag);
            }
        }
        self
    }

    /// Select a column. Model field names are qualified with the model alias.
    pub fn column(mut self, name: &str) -> Self {
        self.columns
            .get_or_insert_with(Vec::new)
            .push(Column::Name(name.to_string()));
        self
    }

    /// Select an expression, e.g. `("count(*) AS ?", (ident("n"),))`.
    pub fn column_expr(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(frag) = self.base.check(Fragment::safe(template, args)) {
                self.columns.get_or_insert_with(Vec::new).push(Column::Expr(frag));
            }
        }
        self
    }

    /// Leave a model field out of the column list.
    pub fn exclude_column(mut self, name: &str) -> Self {
        self.exclude.push(name.to_string());
        self
    }

    pub(crate) fn extra_column(mut self, frag: Fragment) -> Self {
        self.extra_columns.push(frag);
        self
    }

    // ==================== Grouping and ordering ====================

    pub fn group(mut self, column: &str) -> Self {
        let column = self.base.column_ident(column);
        self.group.push(Fragment::Ident(column));
        self
    }

    pub fn group_expr(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(frag) = self.base.check(Fragment::safe(template, args)) {
                self.group.push(frag);
            }
        }
        self
    }

    /// Add a HAVING condition; several are joined with AND.
    pub fn having(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(frag) = self.base.check(Fragment::safe(template, args)) {
                self.having.push(frag);
            }
        }
        self
    }

    /// Order by `"column"`, `"column DESC"` or `"column ASC NULLS LAST"`.
    ///
    /// Anything that is not a column followed by a direction is quoted as one
    /// identifier; use [`Self::order_expr`] for expressions.
    pub fn order(mut self, order: &str) -> Self {
        let order = order.trim();
        if order.is_empty() {
            return self;
        }
        let mut words = order.split_whitespace();
        let column = words.next().unwrap_or(order);
        let direction = words.collect::<Vec<_>>().join(" ");
        let frag = if direction.is_empty() {
            Fragment::Ident(ident(column))
        } else if is_direction(&direction) {
            Fragment::Safe {
                template: "? ?".to_string(),
                args: vec![
                    Fragment::Ident(ident(column)),
                    Fragment::Unsafe(direction.to_ascii_uppercase()),
                ],
            }
        } else {
            Fragment::Ident(ident(order))
        };
        self.order.push(frag);
        self
    }

    pub fn order_expr(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(frag) = self.base.check(Fragment::safe(template, args)) {
                self.order.push(frag);
            }
        }
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Row lock: `lock("UPDATE", ())` renders ` FOR UPDATE`.
    pub fn lock(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            self.lock = self.base.check(Fragment::safe(template, args));
        }
        self
    }

    // ==================== Set operations ====================

    pub fn union(self, other: SelectQuery) -> Self {
        self.set_op(SetOp::Union, other)
    }

    pub fn union_all(self, other: SelectQuery) -> Self {
        self.set_op(SetOp::UnionAll, other)
    }

    pub fn intersect(self, other: SelectQuery) -> Self {
        self.set_op(SetOp::Intersect, other)
    }

    pub fn intersect_all(self, other: SelectQuery) -> Self {
        self.set_op(SetOp::IntersectAll, other)
    }

    pub fn except(self, other: SelectQuery) -> Self {
        self.set_op(SetOp::Except, other)
    }

    pub fn except_all(self, other: SelectQuery) -> Self {
        self.set_op(SetOp::ExceptAll, other)
    }

    fn set_op(mut self, op: SetOp, other: SelectQuery) -> Self {
        if let Some(err) = &other.base.err {
            let err = err.replay();
            self.base.set_err(err);
        } else if !self.base.failed() {
            self.set_ops.push((op, other));
        }
        self
    }

    // ==================== Joins ====================

    /// Add a join clause, e.g. `("LEFT JOIN roles AS r", ())`.
    pub fn join(mut self, template: &str, args: impl IntoArgs) -> Self {
        if !self.base.failed() {
            if let Some(join) = self.base.check(Fragment::safe(template, args)) {
                self.joins.push(JoinClause {
                    join,
                    on: Vec::new(),
                });
            }
        }
        self
    }

    /// Add an ON condition to the last join, joined with AND.
    pub fn join_on(self, template: &str, args: impl IntoArgs) -> Self {
        self.push_join_on(false, template, args)
    }

    /// Add an ON condition to the last join, joined with OR.
    pub fn join_on_or(self, template: &str, args: impl IntoArgs) -> Self {
        self.push_join_on(true, template, args)
    }

    fn push_join_on(mut self, or: bool, template: &str, args: impl IntoArgs) -> Self {
        if self.base.failed() {
            return self;
        }
        if self.joins.is_empty() {
            self.base.set_err(OrmError::build("query has no joins"));
            return self;
        }
        if let Some(cond) = self.base.check(Fragment::safe(template, args)) {
            if let Some(last) = self.joins.last_mut() {
                last.on.push(WherePart {
                    or,
                    cond: Cond::Expr(cond),
                });
            }
        }
        self
    }

    // ==================== Relations ====================

    /// Load a relation of the model along with the rows.
    ///
    /// To-one relations are joined into this query; to-many relations run as
    /// one extra query each after the rows were scanned. Nested relations use
    /// dotted paths (`"author.profile"`); a trailing `._` joins a to-one
    /// relation without selecting its columns.
    pub fn relation(self, path: &str) -> Self {
        self.push_relation(RelationSpec::new(path, None))
    }

    /// Like [`Self::relation`], with a function that customizes the query
    /// of the relation (columns, conditions, order).
    pub fn relation_with(
        self,
        path: &str,
        apply: impl Fn(SelectQuery) -> SelectQuery + Send + Sync + 'static,
    ) -> Self {
        let apply: ApplyFn = Arc::new(apply);
        self.push_relation(RelationSpec::new(path, Some(apply)))
    }

    pub(crate) fn push_relation(mut self, spec: RelationSpec) -> Self {
        if self.base.failed() {
            return self;
        }
        self.relations.push(spec);
        if self.base.table.is_some() {
            if let Err(err) = self.resolve_joins() {
                self.base.set_err(err);
            }
        }
        self
    }

    fn resolve_joins(&self) -> OrmResult<Vec<Join>> {
        if self.relations.is_empty() {
            return Ok(Vec::new());
        }
        relation::resolve_joins(self.base.model()?, &self.relations)
    }

    /// `(key columns) IN (key tuples)` filter of a relation follow-up.
    pub(crate) fn where_in_keys(mut self, columns: Vec<Ident>, keys: Vec<Vec<Value>>) -> Self {
        let composite = columns.len() > 1;
        let tuple = |items: Vec<Fragment>| {
            if composite {
                Fragment::group(Fragment::list(items, ", "))
            } else {
                Fragment::list(items, ", ")
            }
        };
        let lhs = tuple(columns.into_iter().map(Fragment::Ident).collect());
        let rhs = Fragment::list(
            keys.into_iter()
                .map(|key| tuple(key.into_iter().map(Fragment::Value).collect()))
                .collect(),
            ", ",
        );
        let frag = Fragment::safe("? IN (?)", (lhs, rhs));
        self.base.push_where(false, frag);
        self
    }

    pub(crate) fn has_columns(&self) -> bool {
        self.columns.is_some()
    }

    /// Names of the explicitly selected columns.
    pub(crate) fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .flatten()
            .filter_map(|c| match c {
                Column::Name(name) => Some(name.as_str()),
                Column::Expr(_) => None,
            })
            .collect()
    }

    pub(crate) fn wheres(&self) -> &[WherePart] {
        &self.base.wheres
    }

    // ==================== Rendering ====================

    fn is_excluded(&self, field: &crate::schema::Field) -> bool {
        self.exclude
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&field.name) || e.eq_ignore_ascii_case(&field.column))
    }

    fn column_fragments(&self, joins: &[Join]) -> Vec<Fragment> {
        let model = self.base.table.as_deref();
        let mut out = Vec::new();
        match (&self.columns, model) {
            (Some(columns), _) => {
                for column in columns {
                    match column {
                        Column::Name(name) if name == "*" => out.push(Fragment::raw("*")),
                        Column::Name(name) => {
                            match model.and_then(|t| t.field(name).map(|f| (t, f))) {
                                Some((table, field)) if !self.is_excluded(field) => {
                                    let alias = self.base.alias(table);
                                    out.push(Fragment::Ident(Ident::qualified(alias, &field.column)));
                                }
                                Some(_) => {}
                                None => out.push(Fragment::Ident(ident(name))),
                            }
                        }
                        Column::Expr(frag) => out.push(frag.clone()),
                    }
                }
            }
            (None, Some(table)) => {
                let alias = self.base.alias(table);
                out.extend(
                    table
                        .fields
                        .iter()
                        .filter(|f| !self.is_excluded(f))
                        .map(|f| Fragment::Ident(Ident::qualified(alias, &f.column))),
                );
            }
            (None, None) => out.push(Fragment::raw("*")),
        }
        out.extend(self.extra_columns.iter().cloned());
        for join in joins {
            join.push_columns(&mut out);
        }
        out
    }

    pub(crate) fn append_query(
        &self,
        f: &mut Formatter<'_>,
        joins: &[Join],
        count: bool,
    ) -> OrmResult<()> {
        self.base.ensure_ok()?;
        let wrap = !self.group.is_empty() || self.distinct.is_some() || !self.set_ops.is_empty();
        if count && wrap {
            f.push_str("SELECT count(*) FROM (");
            self.append_select(f, joins, Render::Wrapped)?;
            f.push_str(") AS _count_wrapper");
            return Ok(());
        }
        let render = if count { Render::Count } else { Render::Rows };
        self.append_select(f, joins, render)
    }

    fn append_select(&self, f: &mut Formatter<'_>, joins: &[Join], render: Render) -> OrmResult<()> {
        let model = self.base.table.as_deref();
        let features = f.dialect().features();
        let parens = !self.set_ops.is_empty() && features.compound_parens;
        if parens {
            f.push_char('(');
        }

        self.base.append_with(f)?;
        f.push_str("SELECT ");
        match &self.distinct {
            Some(on) if !on.is_empty() => {
                if !features.distinct_on {
                    return Err(OrmError::unsupported(f.dialect().name(), "DISTINCT ON"));
                }
                f.push_str("DISTINCT ON (");
                f.push_list(on, ", ", model)?;
                f.push_str(") ");
            }
            Some(_) => f.push_str("DISTINCT "),
            None => {}
        }

        if render == Render::Count {
            f.push_str("count(*)");
        } else {
            f.push_list(&self.column_fragments(joins), ", ", model)?;
        }

        if self.base.has_tables() {
            f.push_str(" FROM ");
            self.base.append_tables(f, true)?;
        }

        for join in joins {
            join.append_join(f, self.base.soft_delete)?;
        }

        for join in &self.joins {
            f.push_char(' ');
            f.push_fragment(&join.join, model)?;
            if !join.on.is_empty() {
                f.push_str(" ON ");
                append_conds(f, &join.on, model)?;
            }
        }

        self.base.append_where(f, true)?;

        if !self.group.is_empty() {
            f.push_str(" GROUP BY ");
            f.push_list(&self.group, ", ", model)?;
        }

        if !self.having.is_empty() {
            f.push_str(" HAVING ");
            for (i, having) in self.having.iter().enumerate() {
                if i > 0 {
                    f.push_str(" AND ");
                }
                f.push_char('(');
                f.push_fragment(having, model)?;
                f.push_char(')');
            }
        }

        if render == Render::Rows {
            if !self.order.is_empty() {
                f.push_str(" ORDER BY ");
                f.push_list(&self.order, ", ", model)?;
            }

            let mut tail = String::new();
            f.dialect().append_limit_offset(self.limit, self.offset, &mut tail);
            f.push_str(&tail);

            if let Some(lock) = &self.lock {
                if !features.lock_clause {
                    return Err(OrmError::unsupported(f.dialect().name(), "FOR ... lock clause"));
                }
                f.push_str(" FOR ");
                f.push_fragment(lock, model)?;
            }
        }

        if parens {
            f.push_char(')');
        }
        for (op, query) in &self.set_ops {
            if op.needs_intersect_except() && !features.intersect_except {
                return Err(OrmError::unsupported(f.dialect().name(), op.keyword().trim()));
            }
            f.push_str(op.keyword());
            if parens {
                f.push_char('(');
            }
            query.append_sql(f)?;
            if parens {
                f.push_char(')');
            }
        }
        Ok(())
    }

    /// Render the counting form of this query.
    pub fn build_count(&self, dialect: &dyn crate::dialect::Dialect) -> OrmResult<Statement> {
        let joins = self.resolve_joins()?;
        let mut f = Formatter::new(dialect);
        self.append_query(&mut f, &joins, true)?;
        Ok(Statement::from_formatter(f))
    }

    // ==================== Execution ====================

    /// Run the query and return the raw rows.
    pub async fn rows<C: Conn>(mut self, conn: &C) -> OrmResult<Vec<Row>> {
        self.run_hooks_before()?;
        let stmt = self.build(conn.dialect())?;
        let rows = query_rows(conn, Operation::Select, &self.base.label(), &stmt).await?;
        self.run_hooks_after(&stmt.sql, rows.len() as u64)?;
        Ok(rows)
    }

    /// Run the query, discarding rows; returns the driver's row count.
    pub async fn exec<C: Conn>(mut self, conn: &C) -> OrmResult<u64> {
        self.run_hooks_before()?;
        let stmt = self.build(conn.dialect())?;
        let affected = exec_statement(conn, Operation::Select, &self.base.label(), &stmt).await?;
        self.run_hooks_after(&stmt.sql, affected)?;
        Ok(affected)
    }

    /// First row mapped into `T`; [`OrmError::NotFound`] when there is none.
    pub async fn fetch_one<T: FromRow, C: Conn>(self, conn: &C) -> OrmResult<T> {
        match self.fetch_opt(conn).await? {
            Some(value) => Ok(value),
            None => Err(OrmError::not_found("query returned no rows")),
        }
    }

    pub async fn fetch_opt<T: FromRow, C: Conn>(self, conn: &C) -> OrmResult<Option<T>> {
        self.rows(conn).await?.first().map(T::from_row).transpose()
    }

    pub async fn fetch_all<T: FromRow, C: Conn>(self, conn: &C) -> OrmResult<Vec<T>> {
        self.rows(conn).await?.iter().map(T::from_row).collect()
    }

    /// Scan each selected column into its own vector.
    pub async fn fetch_columns<T: FromColumns, C: Conn>(self, conn: &C) -> OrmResult<T> {
        let mut out = T::default();
        for row in self.rows(conn).await? {
            out.push_row(&row)?;
        }
        Ok(out)
    }

    /// First row as model `T`, relations loaded and hooks run.
    pub async fn scan_one<T: Model, C: Conn>(mut self, conn: &C) -> OrmResult<T> {
        self.prepare_scan::<T>()?;
        let loaded = self.load(conn).await?;
        self.run_hooks_after(&loaded.sql, loaded.records.len() as u64)?;
        let record = loaded
            .records
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found("query returned no rows"))?;
        T::from_record(record)
    }

    /// All rows as model `T`, relations loaded and hooks run.
    pub async fn scan_all<T: Model, C: Conn>(mut self, conn: &C) -> OrmResult<Vec<T>> {
        self.prepare_scan::<T>()?;
        let loaded = self.load(conn).await?;
        self.run_hooks_after(&loaded.sql, loaded.records.len() as u64)?;
        loaded.records.into_iter().map(T::from_record).collect()
    }

    /// Rows as model `T` plus the total count ignoring ORDER BY, LIMIT and
    /// OFFSET. Both statements run concurrently; the first error wins.
    pub async fn scan_and_count<T: Model, C: Conn>(
        mut self,
        conn: &C,
    ) -> OrmResult<(Vec<T>, u64)> {
        self.prepare_scan::<T>()?;
        let (loaded, (count, _)) = tokio::try_join!(self.load(conn), self.run_count(conn))?;
        self.run_hooks_after(&loaded.sql, loaded.records.len() as u64)?;
        let items = loaded
            .records
            .into_iter()
            .map(T::from_record)
            .collect::<OrmResult<Vec<_>>>()?;
        Ok((items, count))
    }

    /// `SELECT count(*)` over this query.
    pub async fn count<C: Conn>(mut self, conn: &C) -> OrmResult<u64> {
        self.run_hooks_before()?;
        let (count, sql) = self.run_count(conn).await?;
        self.run_hooks_after(&sql, 1)?;
        Ok(count)
    }

    async fn run_count<C: Conn>(&self, conn: &C) -> OrmResult<(u64, String)> {
        let stmt = self.build_count(conn.dialect())?;
        let rows = query_rows(conn, Operation::Select, &self.base.label(), &stmt).await?;
        let row = rows
            .first()
            .ok_or_else(|| OrmError::not_found("count returned no rows"))?;
        let n: i64 = row.try_get(0)?;
        Ok((u64::try_from(n).unwrap_or(0), stmt.sql))
    }

    /// `SELECT EXISTS (...)` over this query.
    pub async fn exists<C: Conn>(mut self, conn: &C) -> OrmResult<bool> {
        self.run_hooks_before()?;
        let joins = self.resolve_joins()?;
        let mut f = Formatter::new(conn.dialect());
        f.push_str("SELECT EXISTS (");
        self.append_query(&mut f, &joins, false)?;
        f.push_char(')');
        let stmt = Statement::from_formatter(f);
        let rows = query_rows(conn, Operation::Select, &self.base.label(), &stmt).await?;
        self.run_hooks_after(&stmt.sql, rows.len() as u64)?;
        match rows.first() {
            Some(row) => row.try_get(0),
            None => Ok(false),
        }
    }

    fn prepare_scan<T: Model>(&mut self) -> OrmResult<()> {
        self.base.ensure_ok()?;
        if self.base.table.is_none() {
            self.base.set_model::<T>();
            self.base.ensure_ok()?;
            if !self.relations.is_empty() {
                self.resolve_joins()?;
            }
        }
        let table = self.base.model()?;
        if table.type_id != TypeId::of::<T>() {
            return Err(OrmError::config(format!(
                "cannot scan {} rows into {}",
                table.type_name,
                std::any::type_name::<T>()
            )));
        }
        self.run_hooks_before()
    }

    fn run_hooks_before(&mut self) -> OrmResult<()> {
        self.base.ensure_ok()?;
        if let Some(hooks) = self.base.table.as_ref().and_then(|t| t.hooks) {
            hooks.before_select(self)?;
        }
        Ok(())
    }

    fn run_hooks_after(&self, sql: &str, rows: u64) -> OrmResult<()> {
        if let Some(table) = &self.base.table {
            if let Some(hooks) = table.hooks {
                hooks.after_select(&QueryEvent {
                    operation: Operation::Select,
                    table: &table.name,
                    sql,
                    rows,
                })?;
            }
        }
        Ok(())
    }

    /// Run the query and map rows into records of the model, loading
    /// to-many relations with follow-up queries.
    pub(crate) fn load<'a, C: Conn>(&'a self, conn: &'a C) -> BoxFuture<'a, OrmResult<Loaded>> {
        Box::pin(async move {
            let table = Arc::clone(self.base.model()?);
            let joins = self.resolve_joins()?;
            let mut f = Formatter::new(conn.dialect());
            self.append_query(&mut f, &joins, false)?;
            let stmt = Statement::from_formatter(f);

            let rows = query_rows(conn, Operation::Select, &table.name, &stmt).await?;
            let mut records = Vec::with_capacity(rows.len());
            if let Some(first) = rows.first() {
                let plan = ScanPlan::build(&table, first.columns())?;
                for row in &rows {
                    records.push(plan.record(row));
                }
            }

            if !records.is_empty() {
                for join in relation::to_many_joins(&joins) {
                    relation::load_many(conn, join, &mut records).await?;
                }
            }
            Ok(Loaded {
                records,
                sql: stmt.sql,
            })
        })
    }
}

impl SqlQuery for SelectQuery {
    fn append_sql(&self, f: &mut Formatter<'_>) -> OrmResult<()> {
        self.base.ensure_ok()?;
        let joins = self.resolve_joins()?;
        self.append_query(f, &joins, false)
    }
}

fn is_direction(direction: &str) -> bool {
    matches!(
        direction.to_ascii_uppercase().as_str(),
        "ASC"
            | "DESC"
            | "ASC NULLS FIRST"
            | "DESC NULLS FIRST"
            | "ASC NULLS LAST"
            | "DESC NULLS LAST"
    )
}
