//! Partial records: ordered (field, value) pairs supplied by the caller
//!
//! A partial record is the input to every parameterized repository
//! operation. Field order is the order the caller inserted fields in, and
//! it is the order placeholders are numbered in. Field names are validated
//! SQL identifiers, so they can be spliced into statement text; values are
//! always bound out-of-band.

use std::fmt;

use crate::error::CoreError;
use crate::value::Value;

/// Longest identifier PostgreSQL keeps without truncation
const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated column identifier
///
/// Accepts `[A-Za-z_][A-Za-z0-9_]*` up to 63 bytes. Anything else, including
/// quotes, whitespace and punctuation, is rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldName(String);

impl FieldName {
    /// Creates a field name, validating it as a plain SQL identifier
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidIdentifier` if `name` is empty, too long,
    /// or contains characters outside `[A-Za-z0-9_]`, or starts with a digit
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if is_identifier(&name) {
            Ok(Self(name))
        } else {
            Err(CoreError::invalid_identifier(name))
        }
    }

    /// Returns the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for FieldName {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        FieldName::new(value)
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_IDENTIFIER_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An ordered, duplicate-free set of (field, value) pairs
///
/// # Example
///
/// ```rust
/// use record_kernel::PartialRecord;
///
/// let record = PartialRecord::new()
///     .with("id", 5)?
///     .with("name", "a")?;
/// assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["id", "name"]);
/// # Ok::<(), record_kernel::CoreError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRecord {
    fields: Vec<(FieldName, Value)>,
}

impl PartialRecord {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field, returning the record for chaining
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidIdentifier` if `name` is not a valid identifier
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, CoreError> {
        self.set(FieldName::new(name)?, value);
        Ok(self)
    }

    /// Adds a field, or replaces the value of an existing one in place
    ///
    /// Replacing keeps the field at its original position, so placeholder
    /// numbering for the other fields does not shift.
    pub fn set(&mut self, name: FieldName, value: impl Into<Value>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Removes a field, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(field, _)| field.as_str() == name)?;
        Some(self.fields.remove(index).1)
    }

    /// Looks up the value of a field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field.as_str() == name)
            .map(|(_, value)| value)
    }

    /// Returns true if the record contains the field
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over (field, value) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &Value)> {
        self.fields.iter().map(|(field, value)| (field, value))
    }

    /// Iterates over field names in insertion order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(field, _)| field.as_str())
    }

    /// Iterates over values in insertion order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }
}

impl FromIterator<(FieldName, Value)> for PartialRecord {
    fn from_iter<I: IntoIterator<Item = (FieldName, Value)>>(iter: I) -> Self {
        let mut record = PartialRecord::new();
        for (name, value) in iter {
            record.set(name, value);
        }
        record
    }
}

impl<'a> IntoIterator for &'a PartialRecord {
    type Item = &'a (FieldName, Value);
    type IntoIter = std::slice::Iter<'a, (FieldName, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(FieldName::new("id").is_ok());
        assert!(FieldName::new("_private").is_ok());
        assert!(FieldName::new("created_at2").is_ok());
        assert!(FieldName::new("").is_err());
        assert!(FieldName::new("2fast").is_err());
        assert!(FieldName::new("name; DROP TABLE users").is_err());
        assert!(FieldName::new("\"quoted\"").is_err());
        assert!(FieldName::new("a".repeat(64)).is_err());
    }

    #[test]
    fn test_set_replaces_in_place() {
        let record = PartialRecord::new()
            .with("id", 1)
            .and_then(|r| r.with("name", "a"))
            .and_then(|r| r.with("id", 2))
            .unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(record.get("id"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_remove() {
        let mut record = PartialRecord::new().with("id", 1).unwrap();
        assert_eq!(record.remove("id"), Some(Value::Int(1)));
        assert!(record.is_empty());
        assert_eq!(record.remove("id"), None);
    }
}
