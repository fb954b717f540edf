//! Recording Mock Pool
//!
//! An in-memory `ConnectionPool` for exercising the repository without a
//! database. Responses are scripted in order; every statement, every
//! acquire and every release is recorded so tests can assert on pool
//! interaction as well as on the SQL that was produced.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use record_db::{ConnectionPool, DatabaseError, PooledConnection, QueryOutput, StatementKind};
use record_kernel::{Row, Value};

/// A scripted answer for the next statement
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return these rows
    Rows(Vec<Row>),
    /// Report this many affected rows and no rows
    Affected(u64),
    /// Fail with a driver error carrying this message
    Fail(String),
    /// Never complete; for cancellation tests
    Hang,
}

/// A statement as the repository issued it
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
    pub kind: StatementKind,
}

/// Acquire/release accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful acquires
    pub acquired: usize,
    /// Releases that actually returned a connection
    pub released: usize,
    /// Acquire attempts that failed
    pub failed_acquires: usize,
}

impl PoolStats {
    /// Connections currently leased out
    pub fn outstanding(&self) -> usize {
        self.acquired - self.released
    }
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<MockResponse>,
    statements: Vec<ExecutedStatement>,
    stats: PoolStats,
    exhausted: bool,
}

/// An in-memory pool; clones share state
#[derive(Debug, Clone, Default)]
pub struct MockPool {
    state: Arc<Mutex<MockState>>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response, returning the pool for chaining
    pub fn respond(self, response: MockResponse) -> Self {
        self.lock().responses.push_back(response);
        self
    }

    /// Queues a response returning `rows`
    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.respond(MockResponse::Rows(rows))
    }

    /// Queues a response reporting `count` affected rows
    pub fn with_affected(self, count: u64) -> Self {
        self.respond(MockResponse::Affected(count))
    }

    /// Queues a driver failure
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.respond(MockResponse::Fail(message.into()))
    }

    /// Makes every subsequent acquire fail with `PoolExhausted`
    pub fn exhausted(self) -> Self {
        self.lock().exhausted = true;
        self
    }

    pub fn stats(&self) -> PoolStats {
        self.lock().stats
    }

    /// Every statement issued so far, in order
    pub fn statements(&self) -> Vec<ExecutedStatement> {
        self.lock().statements.clone()
    }

    pub fn last_statement(&self) -> Option<ExecutedStatement> {
        self.lock().statements.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the accounting from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConnectionPool for MockPool {
    type Connection = MockConnection;

    async fn acquire(&self) -> Result<Self::Connection, DatabaseError> {
        let mut state = self.lock();
        if state.exhausted {
            state.stats.failed_acquires += 1;
            return Err(DatabaseError::PoolExhausted);
        }
        state.stats.acquired += 1;
        Ok(MockConnection {
            pool: self.clone(),
            released: false,
        })
    }
}

/// A connection leased from a [`MockPool`]
#[derive(Debug)]
pub struct MockConnection {
    pool: MockPool,
    released: bool,
}

impl MockConnection {
    async fn run(
        &mut self,
        sql: &str,
        params: &[Value],
        kind: StatementKind,
    ) -> Result<QueryOutput, DatabaseError> {
        if self.released {
            return Err(DatabaseError::ConnectionReleased);
        }

        let response = {
            let mut state = self.pool.lock();
            state.statements.push(ExecutedStatement {
                sql: sql.to_string(),
                params: params.to_vec(),
                kind,
            });
            state.responses.pop_front()
        };

        match response {
            Some(MockResponse::Rows(rows)) => Ok(QueryOutput::from_rows(rows)),
            Some(MockResponse::Affected(count)) => Ok(QueryOutput::affected(count)),
            Some(MockResponse::Fail(message)) => {
                Err(DatabaseError::Sql(sqlx::Error::Protocol(message)))
            }
            Some(MockResponse::Hang) => std::future::pending().await,
            None => Ok(match kind {
                StatementKind::Fetch => QueryOutput::from_rows(Vec::new()),
                StatementKind::Execute => QueryOutput::affected(0),
            }),
        }
    }
}

#[async_trait]
impl PooledConnection for MockConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput, DatabaseError> {
        self.run(sql, params, StatementKind::Fetch).await
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput, DatabaseError> {
        self.run(sql, params, StatementKind::Execute).await
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.pool.lock().stats.released += 1;
        }
    }
}
