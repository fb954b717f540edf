//! Pool capability and scoped connection leasing
//!
//! The repository only needs three things from a pool: hand out a
//! connection, run a parameterized statement on it, and take it back.
//! `ConnectionPool` and `PooledConnection` describe exactly that, so the
//! repository runs against `sqlx::PgPool` in production and against a
//! recording mock in tests.
//!
//! A connection is always held through a [`Lease`]. Dropping the lease
//! releases the connection, which covers every way out of an operation:
//! normal return, early return through `?`, and a future that is dropped
//! while suspended.

use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use record_kernel::{Row, Value};

use crate::error::DatabaseError;

/// Rows returned by a statement plus its row count
///
/// For statements that return rows, `row_count` is the number of rows
/// returned. For statements run through [`PooledConnection::execute`], `rows`
/// is empty and `row_count` is the number of rows affected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub row_count: u64,
}

impl QueryOutput {
    /// Output of a row-returning statement
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }

    /// Output of a statement that only reports affected rows
    pub fn affected(row_count: u64) -> Self {
        Self {
            rows: Vec::new(),
            row_count,
        }
    }

    /// Takes the first row, discarding the rest
    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }
}

/// A connection checked out of a pool
#[async_trait]
pub trait PooledConnection: Send {
    /// Runs a statement that returns rows
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput, DatabaseError>;

    /// Runs a statement and reports the number of rows it affected
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput, DatabaseError>;

    /// Returns the connection to its pool
    ///
    /// Must be idempotent: calls after the first do nothing.
    fn release(&mut self);
}

/// A source of pooled connections
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    type Connection: PooledConnection;

    /// Checks out a connection, waiting according to the pool's own policy
    async fn acquire(&self) -> Result<Self::Connection, DatabaseError>;
}

/// Exclusive, scoped ownership of a pooled connection
///
/// Derefs to the connection. Released exactly once, on drop.
pub struct Lease<C: PooledConnection> {
    connection: C,
}

impl<C: PooledConnection> Lease<C> {
    pub fn new(connection: C) -> Self {
        Self { connection }
    }
}

impl<C: PooledConnection> Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl<C: PooledConnection> DerefMut for Lease<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}

impl<C: PooledConnection> Drop for Lease<C> {
    fn drop(&mut self) {
        self.connection.release();
    }
}
