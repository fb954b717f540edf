//! Table identity
//!
//! A repository's table is either declared explicitly or derived from the
//! repository's own type name by the `<Entity>Repository` convention:
//!
//! | Repository name           | Table          |
//! |---------------------------|----------------|
//! | `UserAccountRepository`   | `user_account` |
//! | `user_accountRepository`  | `user_account` |
//! | `USERRepository`          | (empty)        |
//! | `repository`              | (empty)        |
//!
//! The derivation drops the last underscore-separated segment whatever it
//! is, so names without a lowercase-to-uppercase boundary collapse to an
//! empty table name. That output is kept as is; statements against an
//! empty table name are rejected by the database. Any other result must be
//! a plain identifier, the same rule explicit tables follow.

use std::fmt;

use crate::error::CoreError;
use crate::record::is_identifier;

/// The table a repository reads and writes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Declares a table explicitly
    ///
    /// Accepts `table` or `schema.table`, each part a plain identifier.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidIdentifier` for anything else
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        let parts = name.split('.').collect::<Vec<_>>();
        if parts.len() <= 2 && parts.iter().all(|part| is_identifier(part)) {
            Ok(Self(name))
        } else {
            Err(CoreError::invalid_identifier(name))
        }
    }

    /// Derives the table from a repository type name
    ///
    /// An empty result is kept; see the module docs for the degenerate cases.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidIdentifier` if the derived name is not
    /// empty and not a plain identifier
    pub fn from_repository_name(repository_name: &str) -> Result<Self, CoreError> {
        let resolved = resolve_table_name(repository_name);
        if resolved.is_empty() || is_identifier(&resolved) {
            Ok(Self(resolved))
        } else {
            Err(CoreError::invalid_identifier(resolved))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the convention produced no table name
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Converts `<Entity>Repository` into the snake_case `<entity>` table name
///
/// An underscore goes between every ASCII lowercase letter and a directly
/// following ASCII uppercase letter, the result is lowercased and split on
/// underscores, and every segment but the last is joined back together.
pub fn resolve_table_name(repository_name: &str) -> String {
    let mut snake = String::with_capacity(repository_name.len() + 4);
    let mut previous: Option<char> = None;
    for c in repository_name.chars() {
        if c.is_ascii_uppercase() && previous.is_some_and(|p| p.is_ascii_lowercase()) {
            snake.push('_');
        }
        snake.push(c);
        previous = Some(c);
    }

    let snake = snake.to_lowercase();
    let segments = snake.split('_').collect::<Vec<_>>();
    segments[..segments.len() - 1].join("_")
}
