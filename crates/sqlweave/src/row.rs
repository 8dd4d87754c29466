//! Result rows and row-to-value mapping.

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// One result row: column names (shared by every row of a result set) and values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Index of a column, case-insensitive.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(column)))
    }

    /// Decode the value at `idx`.
    pub fn try_get<T: FromValue>(&self, idx: usize) -> OrmResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            OrmError::decode(idx.to_string(), format!("row has only {} column(s)", self.len()))
        })?;
        T::from_value(value.clone()).map_err(|e| OrmError::decode(&self.columns[idx], e.to_string()))
    }

    /// Decode the value of a named column.
    pub fn try_get_column<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let idx = self
            .index_of(column)
            .ok_or_else(|| OrmError::decode(column, "column not found"))?;
        self.try_get(idx)
    }

    /// Iterate `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Trait for types that can be built from a single row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> OrmResult<Self>;
}

macro_rules! impl_from_row_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromRow for $ty {
                fn from_row(row: &Row) -> OrmResult<Self> {
                    row.try_get(0)
                }
            }

            impl FromRow for Option<$ty> {
                fn from_row(row: &Row) -> OrmResult<Self> {
                    row.try_get(0)
                }
            }
        )*
    };
}

impl_from_row_scalar!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    String,
    Vec<u8>,
    Value,
    serde_json::Value,
    uuid::Uuid,
    chrono::DateTime<chrono::Utc>,
    chrono::NaiveDateTime,
    chrono::NaiveDate,
);

/// Maps accept any column set.
impl FromRow for HashMap<String, Value> {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row
            .iter()
            .map(|(c, v)| (c.to_string(), v.clone()))
            .collect())
    }
}

macro_rules! impl_from_row_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> OrmResult<Self> {
                Ok(($(row.try_get::<$name>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(A: 0, B: 1);
impl_from_row_tuple!(A: 0, B: 1, C: 2);
impl_from_row_tuple!(A: 0, B: 1, C: 2, D: 3);
impl_from_row_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_from_row_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Per-column destinations: each column of every row is appended to its own vector.
///
/// ```ignore
/// let (ids, names): (Vec<i64>, Vec<String>) = select()
///     .table("users")
///     .column("id")
///     .column("name")
///     .fetch_columns(&conn)
///     .await?;
/// ```
pub trait FromColumns: Default {
    fn push_row(&mut self, row: &Row) -> OrmResult<()>;
}

macro_rules! impl_from_columns_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: FromValue),+> FromColumns for ($(Vec<$name>,)+) {
            fn push_row(&mut self, row: &Row) -> OrmResult<()> {
                $(self.$idx.push(row.try_get::<$name>($idx)?);)+
                Ok(())
            }
        }
    };
}

impl_from_columns_tuple!(A: 0);
impl_from_columns_tuple!(A: 0, B: 1);
impl_from_columns_tuple!(A: 0, B: 1, C: 2);
impl_from_columns_tuple!(A: 0, B: 1, C: 2, D: 3);
impl_from_columns_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cols: &[&str], values: Vec<Value>) -> Row {
        Row::new(cols.iter().map(|c| c.to_string()).collect(), values)
    }

    #[test]
    fn scalar_reads_first_column() {
        let r = row(&["n"], vec![Value::Int(7)]);
        assert_eq!(i64::from_row(&r).unwrap(), 7);
        assert_eq!(Option::<i64>::from_row(&row(&["n"], vec![Value::Null])).unwrap(), None);
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let r = row(&["Name"], vec![Value::Text("x".into())]);
        let name: String = r.try_get_column("name").unwrap();
        assert_eq!(name, "x");
        assert!(r.try_get_column::<String>("missing").is_err());
    }

    #[test]
    fn map_takes_every_column() {
        let r = row(&["a", "b"], vec![Value::Int(1), Value::Null]);
        let m = HashMap::<String, Value>::from_row(&r).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m["a"], Value::Int(1));
    }

    #[test]
    fn columns_collect_per_column() {
        let mut cols: (Vec<i64>, Vec<String>) = Default::default();
        cols.push_row(&row(&["id", "s"], vec![Value::Int(1), Value::Text("a".into())]))
            .unwrap();
        cols.push_row(&row(&["id", "s"], vec![Value::Int(2), Value::Text("b".into())]))
            .unwrap();
        assert_eq!(cols.0, vec![1, 2]);
        assert_eq!(cols.1, vec!["a", "b"]);
    }
}
