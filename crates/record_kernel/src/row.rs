//! Decoded result rows
//!
//! Column names come from the database, so unlike `PartialRecord` they are
//! not validated. A row maps onto any `serde::Deserialize` entity by going
//! through a JSON object keyed by column name.

use serde::de::DeserializeOwned;

use crate::value::Value;

/// A single result row, columns in result-set order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty row with room for `capacity` columns
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Appends a column, returning the row for chaining
    pub fn column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// Appends a column
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((name.into(), value.into()));
    }

    /// Looks up a column by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates over (column, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(column, value)| (column.as_str(), value))
    }

    /// Renders the row as a JSON object keyed by column name
    ///
    /// If a column name repeats, the last occurrence wins.
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .columns
            .iter()
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }

    /// Maps the row onto an entity type
    ///
    /// # Errors
    ///
    /// Returns the serde error if a required field is missing or a column
    /// value does not fit the entity's field type
    pub fn into_entity<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.push(name, value);
        }
        row
    }
}
