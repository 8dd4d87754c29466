//! Records: the untyped tree between result rows and model structs.
//!
//! The row mapper routes each column into a [`Record`] keyed by logical field
//! name; embedded structs and to-one relations become child records and
//! to-many relations become record lists. `#[derive(Model)]` then converts a
//! record into the typed struct in one pass.

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Value, decode_json};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: HashMap<String, Value>,
    children: HashMap<String, Record>,
    many: HashMap<String, Vec<Record>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn set_child(&mut self, name: &str, child: Record) {
        self.children.insert(name.to_string(), child);
    }

    pub fn set_many(&mut self, name: &str, records: Vec<Record>) {
        self.many.insert(name.to_string(), records);
    }

    /// Set a value at a nested path, creating child records on the way.
    pub fn set_path<S: AsRef<str>>(&mut self, path: &[S], value: Value) {
        match path {
            [] => {}
            [name] => self.set_value(name.as_ref(), value),
            [head, rest @ ..] => self
                .children
                .entry(head.as_ref().to_string())
                .or_default()
                .set_path(rest, value),
        }
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Value at a nested path.
    pub fn value_at<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        match path {
            [] => None,
            [name] => self.values.get(name.as_ref()),
            [head, rest @ ..] => self.children.get(head.as_ref())?.value_at(rest),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Record> {
        self.children.get(name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Record> {
        self.children.get_mut(name)
    }

    pub fn many(&self, name: &str) -> Option<&[Record]> {
        self.many.get(name).map(Vec::as_slice)
    }

    pub fn take_value(&mut self, name: &str) -> Value {
        self.values.remove(name).unwrap_or(Value::Null)
    }

    pub fn take_child(&mut self, name: &str) -> Option<Record> {
        self.children.remove(name)
    }

    pub fn take_many(&mut self, name: &str) -> Vec<Record> {
        self.many.remove(name).unwrap_or_default()
    }

    /// Decode a scalar field. A missing field decodes as NULL.
    pub fn decode<T: FromValue>(&mut self, name: &str) -> OrmResult<T> {
        T::from_value(self.take_value(name)).map_err(|e| OrmError::decode(name, e.to_string()))
    }

    /// Decode a JSON-tagged field. NULL or missing yields `T::default()`.
    pub fn decode_json<T>(&mut self, name: &str) -> OrmResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        decode_json(self.take_value(name)).map_err(|e| OrmError::decode(name, e.to_string()))
    }

    /// Child record for an optional struct, `None` when absent or entirely NULL.
    pub fn take_present_child(&mut self, name: &str) -> Option<Record> {
        self.take_child(name).filter(|c| !c.is_null())
    }

    /// True when every value (recursively) is NULL and no related rows are attached.
    pub fn is_null(&self) -> bool {
        self.values.values().all(Value::is_null)
            && self.children.values().all(Record::is_null)
            && self.many.values().all(Vec::is_empty)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.is_empty() && self.many.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths() {
        let mut r = Record::new();
        r.set_path(&["address", "city"], Value::Text("Oslo".into()));
        r.set_path(&["id"], Value::Int(1));

        assert_eq!(r.value_at(&["address", "city"]), Some(&Value::Text("Oslo".into())));
        assert_eq!(r.value_at(&["id"]), Some(&Value::Int(1)));
        assert!(r.value_at(&["address", "zip"]).is_none());
    }

    #[test]
    fn all_null_child_is_absent() {
        let mut r = Record::new();
        r.set_path(&["sub", "a"], Value::Null);
        r.set_path(&["sub", "b"], Value::Null);
        assert!(r.take_present_child("sub").is_none());

        let mut r = Record::new();
        r.set_path(&["sub", "a"], Value::Int(0));
        assert!(r.take_present_child("sub").is_some());
    }

    #[test]
    fn missing_scalar_decodes_to_zero() {
        let mut r = Record::new();
        let n: i64 = r.decode("missing").unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn decode_error_names_field() {
        let mut r = Record::new();
        r.set_value("n", Value::Text("abc".into()));
        let err = r.decode::<i64>("n").unwrap_err();
        assert!(matches!(err, OrmError::Decode { ref column, .. } if column == "n"));
    }
}
