//! # sqlweave
//!
//! A model-first query builder and result mapper for PostgreSQL, MySQL and
//! SQLite.
//!
//! ## Features
//!
//! - **Models**: `#[derive(Model)]` describes a struct's table, columns, keys,
//!   embedded structs and relations; the metadata is built once per type
//! - **Builders**: SELECT/INSERT/UPDATE/DELETE with `?` templates, quoted
//!   identifiers and bound values, rendered for any [`Dialect`]
//! - **Relations**: to-one relations are joined, to-many and many-to-many
//!   relations load with one extra query each
//! - **Mapping**: rows into models, scalars, tuples, maps or per-column vectors
//! - **Transactions**: [`Tx`] plus the `transaction!` and `savepoint!` macros
//!
//! ```ignore
//! use sqlweave::prelude::*;
//!
//! #[derive(Debug, Model)]
//! struct User {
//!     #[orm(pk, autoincrement)]
//!     id: i64,
//!     name: String,
//!     #[orm(has_many, join = "id=author_id")]
//!     posts: Vec<Post>,
//! }
//!
//! let conn = SqliteConn::open_in_memory()?;
//! let (users, total) = select()
//!     .model::<User>()
//!     .relation("posts")
//!     .order("name")
//!     .limit(10)
//!     .scan_and_count::<User, _>(&conn)
//!     .await?;
//! ```

extern crate self as sqlweave;

pub mod client;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod formatter;
pub mod fragment;
pub mod hooks;
pub mod ident;
mod mapper;
pub mod query;
pub mod record;
mod relation;
pub mod row;
pub mod schema;
pub mod trace;
pub mod transaction;
pub mod value;

pub use client::Conn;
pub use dialect::{Dialect, Features, MySqlDialect, MySqlVersion, PgDialect, SqliteDialect};
pub use error::{OrmError, OrmResult};
pub use formatter::Formatter;
pub use fragment::{Fragment, In, IntoArg, IntoArgs, Json, Safe, ident};
pub use hooks::{Operation, QueryEvent, QueryHooks};
pub use ident::{Ident, IntoIdent};
pub use mapper::scan_model;
pub use query::{
    CreateTableQuery, DeleteQuery, DropTableQuery, InsertQuery, SelectQuery, SqlQuery, Statement,
    UpdateQuery, create_table, delete, drop_table, insert, select, update,
};
pub use record::Record;
pub use relation::ApplyFn;
pub use row::{FromColumns, FromRow, Row};
pub use schema::{Model, TableMetadata, registry};
pub use transaction::{IsolationLevel, Tx, TxOptions};
pub use value::{ColumnType, FromValue, SqlType, ToValue, Value};

#[cfg(feature = "sqlite")]
pub use driver::sqlite::SqliteConn;

#[cfg(feature = "derive")]
pub use sqlweave_derive::Model;

/// Everything needed to declare models and run queries.
pub mod prelude {
    pub use crate::{
        Conn, In, Json, Model, OrmError, OrmResult, SqlQuery, Tx, delete, ident, insert, select,
        update,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::SqliteConn;
}

#[doc(hidden)]
pub mod __private {
    pub use crate::mapper::scan_model;
    pub use crate::transaction::macro_support::{Caught, catch_unwind, finish};
}
