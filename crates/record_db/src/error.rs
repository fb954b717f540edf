//! Database error types
//!
//! Driver failures are carried unchanged in `DatabaseError::Sql`; the
//! classification helpers below look inside them without translating them
//! into other variants. There is no not-found variant: lookups return
//! `None` and mutations report a zero row count.

use record_kernel::CoreError;
use thiserror::Error;

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A precondition on the caller's input failed before any I/O
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A statement was issued on a connection already returned to the pool
    #[error("Connection already released to the pool")]
    ConnectionReleased,

    /// An INSERT ... RETURNING produced no row
    #[error("Insert into '{table}' returned no row")]
    MissingReturnedRow { table: String },

    /// Serialization/deserialization error while mapping a row to an entity
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid or missing pool configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid identifier or other kernel-level rejection
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error raised by the driver, passed through unchanged
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Creates a bad request error
    ///
    /// # Example
    ///
    /// ```rust
    /// use record_db::DatabaseError;
    ///
    /// let error = DatabaseError::bad_request("missing id");
    /// assert!(error.is_bad_request());
    /// assert!(error.to_string().contains("missing id"));
    /// ```
    pub fn bad_request(message: impl Into<String>) -> Self {
        DatabaseError::BadRequest(message.into())
    }

    /// Checks if this error is a caller precondition failure
    pub fn is_bad_request(&self) -> bool {
        matches!(self, DatabaseError::BadRequest(_) | DatabaseError::Core(_))
    }

    /// Returns the PostgreSQL SQLSTATE code of a driver error, if any
    ///
    /// See <https://www.postgresql.org/docs/current/errcodes-appendix.html>
    pub fn sql_state(&self) -> Option<String> {
        match self {
            DatabaseError::Sql(sqlx::Error::Database(db_err)) => {
                db_err.code().map(|code| code.into_owned())
            }
            _ => None,
        }
    }

    /// Checks if this error is a constraint violation (SQLSTATE class 23)
    pub fn is_constraint_violation(&self) -> bool {
        self.sql_state().is_some_and(|code| code.starts_with("23"))
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_)
                | DatabaseError::PoolExhausted
                | DatabaseError::ConnectionReleased
                | DatabaseError::Sql(
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
        )
    }
}

impl From<config::ConfigError> for DatabaseError {
    fn from(error: config::ConfigError) -> Self {
        DatabaseError::Configuration(error.to_string())
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(error: serde_json::Error) -> Self {
        DatabaseError::Serialization(error.to_string())
    }
}
