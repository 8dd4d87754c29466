//! Model query hooks.
//!
//! A model opts in with `#[orm(hooks = AuditHooks)]`, naming a unit struct that
//! implements [`QueryHooks`]. Before-hooks run once per top-level operation,
//! after the builder is complete and before rendering, and may still modify
//! the query. After-hooks run once the statement finished successfully.
//! An error returned from any hook aborts the operation.
//!
//! ```ignore
//! struct SoftScope;
//!
//! impl QueryHooks for SoftScope {
//!     fn before_select(&self, query: &mut SelectQuery) -> OrmResult<()> {
//!         query.add_where("?TableAlias.tenant_id = ?", (current_tenant(),));
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::OrmResult;
use crate::query::{DeleteQuery, InsertQuery, SelectQuery, UpdateQuery};

/// Kind of statement an [`QueryEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    /// `CREATE TABLE`
    Create,
    /// `DROP TABLE`
    Drop,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Select => "SELECT",
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Create => "CREATE TABLE",
            Operation::Drop => "DROP TABLE",
        }
    }
}

/// What an after-hook gets to see.
#[derive(Debug, Clone)]
pub struct QueryEvent<'a> {
    pub operation: Operation,
    pub table: &'a str,
    pub sql: &'a str,
    /// Rows returned (select) or affected (writes).
    pub rows: u64,
}

/// Lifecycle callbacks of a model. Every method defaults to a no-op.
pub trait QueryHooks: Send + Sync {
    fn before_select(&self, query: &mut SelectQuery) -> OrmResult<()> {
        let _ = query;
        Ok(())
    }

    fn after_select(&self, event: &QueryEvent<'_>) -> OrmResult<()> {
        let _ = event;
        Ok(())
    }

    fn before_insert(&self, query: &mut InsertQuery) -> OrmResult<()> {
        let _ = query;
        Ok(())
    }

    fn after_insert(&self, event: &QueryEvent<'_>) -> OrmResult<()> {
        let _ = event;
        Ok(())
    }

    fn before_update(&self, query: &mut UpdateQuery) -> OrmResult<()> {
        let _ = query;
        Ok(())
    }

    fn after_update(&self, event: &QueryEvent<'_>) -> OrmResult<()> {
        let _ = event;
        Ok(())
    }

    fn before_delete(&self, query: &mut DeleteQuery) -> OrmResult<()> {
        let _ = query;
        Ok(())
    }

    fn after_delete(&self, event: &QueryEvent<'_>) -> OrmResult<()> {
        let _ = event;
        Ok(())
    }
}
