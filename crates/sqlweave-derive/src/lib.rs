//! Derive macros for sqlweave
//!
//! Provides `#[derive(Model)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod common;
mod model;

/// Derive `Model` (and `FromRow`) for a struct.
///
/// # Example
///
/// ```ignore
/// use sqlweave::Model;
///
/// #[derive(Model)]
/// #[orm(table = "users")]
/// struct User {
///     #[orm(pk, autoincrement)]
///     id: i64,
///     #[orm(column = "user_name")]
///     name: String,
///     #[orm(json)]
///     settings: Settings,
///     #[orm(soft_delete)]
///     deleted_at: Option<DateTime<Utc>>,
///     #[orm(has_one, join = "id=user_id")]
///     profile: Option<Profile>,
///     #[orm(has_many, join = "id=author_id", order = "id")]
///     posts: Vec<Post>,
/// }
/// ```
///
/// # Struct attributes
///
/// - `table = "name"` - table name (default: pluralized snake_case type name)
/// - `alias = "name"` - alias in queries (default: snake_case type name)
/// - `hooks = Type` - unit struct implementing `QueryHooks`
///
/// # Field attributes
///
/// - `column = "name"`, `pk`, `autoincrement`, `soft_delete`, `json`,
///   `nullzero`, `unique`, `default = "sql"`, `skip`
/// - `embed` / `embed = "prefix_"` - flatten a struct into this table
/// - `belongs_to`, `has_one` (field type `Option<T>` or `Option<Box<T>>`)
/// - `has_many`, `m2m = "junction_table"` (field type `Vec<T>`)
/// - `join = "base_col=join_col, ..."`, `order = "col DESC"`, `filter = "sql"`
///
/// Unknown keys are ignored.
#[proc_macro_derive(Model, attributes(orm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
