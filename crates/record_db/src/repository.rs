//! Generic record repository
//!
//! One `Repository<T, P>` serves one table. Every operation follows the
//! same path: synthesize the statement, lease a connection from the pool,
//! run the statement, map the rows onto `T`, and let the lease release the
//! connection however the operation ends. Nothing is held between calls.
//!
//! # Table naming
//!
//! The table comes from the repository's own type name. The [`repository!`]
//! macro declares a `<Entity>Repository` alias and records that identifier
//! on the entity, so the name is fixed at compile time:
//!
//! ```rust,ignore
//! #[derive(Debug, serde::Deserialize)]
//! pub struct UserAccount { id: i64, name: String }
//!
//! record_db::repository!(pub UserAccountRepository => UserAccount);
//!
//! let repo = UserAccountRepository::new(pool)?;
//! assert_eq!(repo.table().as_str(), "user_account");
//! ```
//!
//! [`Repository::with_table`] declares a table explicitly instead.
//!
//! [`repository!`]: crate::repository

use std::fmt;
use std::marker::PhantomData;

use record_kernel::{CoreError, PartialRecord, Row, TableName};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::connection::{ConnectionPool, Lease, PooledConnection, QueryOutput};
use crate::error::DatabaseError;
use crate::pool::DatabasePool;
use crate::query::{Statement, StatementKind};

/// A record type a repository can map rows onto
pub trait Entity: DeserializeOwned {
    /// Type name of the repository serving this entity, e.g. `UserAccountRepository`
    const REPOSITORY_NAME: &'static str;

    /// The table derived from [`Self::REPOSITORY_NAME`]
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidIdentifier` if the derived name is not an
    /// identifier, which only a hand-written `REPOSITORY_NAME` can cause
    fn table_name() -> Result<TableName, CoreError> {
        TableName::from_repository_name(Self::REPOSITORY_NAME)
    }
}

/// Declares a `<Entity>Repository` type alias and ties the entity to it
///
/// Expands to an [`Entity`] impl whose `REPOSITORY_NAME` is the alias
/// identifier, and to `type $name<P = DatabasePool> = Repository<$entity, P>`.
#[macro_export]
macro_rules! repository {
    ($(#[$meta:meta])* $vis:vis $name:ident => $entity:ty) => {
        impl $crate::Entity for $entity {
            const REPOSITORY_NAME: &'static str = stringify!($name);
        }

        $(#[$meta])*
        $vis type $name<P = $crate::DatabasePool> = $crate::Repository<$entity, P>;
    };
}

/// CRUD access to one table, generic over the row type and the pool
pub struct Repository<T, P = DatabasePool> {
    pool: P,
    table: TableName,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, P: ConnectionPool> Repository<T, P> {
    /// Creates a repository whose table follows the entity's repository name
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` if the derived table name is invalid
    pub fn new(pool: P) -> Result<Self, DatabaseError> {
        Ok(Self::with_table(pool, T::table_name()?))
    }
}

impl<T, P: ConnectionPool> Repository<T, P> {
    /// Creates a repository over an explicitly declared table
    pub fn with_table(pool: P, table: TableName) -> Self {
        Self {
            pool,
            table,
            _entity: PhantomData,
        }
    }

    /// The table this repository reads and writes
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// The pool connections are leased from
    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Runs one statement on a freshly leased connection
    ///
    /// The lease is dropped, and the connection released, before this
    /// returns, whether the statement succeeded or not.
    async fn run(&self, statement: Statement) -> Result<QueryOutput, DatabaseError> {
        let mut lease = Lease::new(self.pool.acquire().await?);

        debug!(
            table = %self.table,
            sql = %statement.sql,
            params = ?statement.params.iter().map(record_kernel::Value::kind).collect::<Vec<_>>(),
            "Executing statement"
        );

        match statement.kind {
            StatementKind::Fetch => lease.query(&statement.sql, &statement.params).await,
            StatementKind::Execute => lease.execute(&statement.sql, &statement.params).await,
        }
    }
}

impl<T: DeserializeOwned, P: ConnectionPool> Repository<T, P> {
    /// Returns every row of the table
    ///
    /// An empty table yields an empty vector.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn find_all(&self) -> Result<Vec<T>, DatabaseError> {
        let output = self.run(Statement::select_all(&self.table)).await?;
        output.rows.into_iter().map(to_entity).collect()
    }

    /// Looks up a row by its `id`
    ///
    /// Returns `Ok(None)` when no row has that id.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn find_by_id(&self, id: i64) -> Result<Option<T>, DatabaseError> {
        let output = self.run(Statement::select_by_id(&self.table, id)).await?;
        output.into_first().map(to_entity).transpose()
    }

    /// Returns the first row whose fields equal every field of `record`
    ///
    /// Returns `Ok(None)` when nothing matches. An empty record produces an
    /// empty WHERE clause, which the database rejects.
    #[instrument(skip_all, fields(table = %self.table, fields = record.len()))]
    pub async fn find_by(&self, record: &PartialRecord) -> Result<Option<T>, DatabaseError> {
        let output = self.run(Statement::select_where(&self.table, record)).await?;
        output.into_first().map(to_entity).transpose()
    }

    /// Inserts `record` and returns the created row
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::MissingReturnedRow` if the insert produced no
    /// row, and propagates driver errors such as constraint violations
    #[instrument(skip_all, fields(table = %self.table, fields = record.len()))]
    pub async fn save(&self, record: &PartialRecord) -> Result<T, DatabaseError> {
        let output = self.run(Statement::insert(&self.table, record)).await?;
        let row = output
            .into_first()
            .ok_or_else(|| DatabaseError::MissingReturnedRow {
                table: self.table.to_string(),
            })?;
        to_entity(row)
    }

    /// Updates the row identified by `record`'s `id` and returns it
    ///
    /// Returns `Ok(None)` when no row has that id; callers treat that as
    /// not found.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::BadRequest` without touching the pool if
    /// `record` has no `id`, or nothing but `id`
    #[instrument(skip_all, fields(table = %self.table, fields = record.len()))]
    pub async fn update(&self, record: &PartialRecord) -> Result<Option<T>, DatabaseError> {
        let statement = Statement::update(&self.table, record)?;
        let output = self.run(statement).await?;

        match output.into_first() {
            Some(row) => to_entity(row).map(Some),
            None => {
                warn!(table = %self.table, "Update matched no row");
                Ok(None)
            }
        }
    }

    /// Deletes the rows whose fields equal every field of `record`
    ///
    /// Returns the raw execution result; `row_count == 0` means nothing
    /// matched and is not an error.
    #[instrument(skip_all, fields(table = %self.table, fields = record.len()))]
    pub async fn delete(&self, record: &PartialRecord) -> Result<QueryOutput, DatabaseError> {
        self.run(Statement::delete(&self.table, record)).await
    }
}

fn to_entity<T: DeserializeOwned>(row: Row) -> Result<T, DatabaseError> {
    Ok(row.into_entity()?)
}

impl<T, P: Clone> Clone for Repository<T, P> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            table: self.table.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T, P> fmt::Debug for Repository<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &std::any::type_name::<T>())
            .field("table", &self.table)
            .finish()
    }
}
