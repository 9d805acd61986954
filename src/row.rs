use crate::types::TypedValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identifier assigned to a row when it is inserted. Never reused
/// within a table's lifetime, so index entries survive deletions.
pub type RowId = u64;

pub(crate) static NULL: TypedValue = TypedValue::Null;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub data: HashMap<String, TypedValue>,
}

impl Row {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn insert(&mut self, column: String, value: TypedValue) {
        self.data.insert(column, value);
    }

    pub fn get(&self, column: &str) -> Option<&TypedValue> {
        self.data.get(column)
    }

    /// Missing columns read as NULL.
    pub fn value(&self, column: &str) -> &TypedValue {
        self.data.get(column).unwrap_or(&NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.data.contains_key(column)
    }

    pub fn get_all(&self) -> &HashMap<String, TypedValue> {
        &self.data
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_as_string(&self, column: &str) -> String {
        match self.data.get(column) {
            Some(value) => value.to_string(),
            None => "NULL".to_string(),
        }
    }

    /// Values laid out in the given column order.
    pub fn values_in(&self, columns: &[String]) -> Vec<TypedValue> {
        columns.iter().map(|c| self.value(c).clone()).collect()
    }

    pub fn from_values(values: Vec<(String, TypedValue)>) -> Self {
        let mut row = Self::new();
        for (column, value) in values {
            row.insert(column, value);
        }
        row
    }
}

impl<K: Into<String>, V: Into<TypedValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
