//! Record Database Layer
//!
//! This crate provides a generic, convention-based repository over
//! PostgreSQL using SQLx. A single `Repository<T>` performs find-all,
//! find-by-id, find-by-partial, save, update and delete against the table
//! named after its `<Entity>Repository` type, building parameterized SQL
//! from caller-supplied partial records at runtime.
//!
//! # Architecture
//!
//! - `query`: clause and statement synthesis with positional placeholders
//! - `connection`: the pool capability traits and the scoped `Lease`
//! - `postgres`: the `PgPool` implementation of that capability
//! - `repository`: the generic repository and the `repository!` macro
//! - `pool` / `context`: explicit pool configuration and ownership
//!
//! # Example
//!
//! ```rust,ignore
//! use record_db::{repository, DatabaseConfig, DatabaseContext};
//! use record_kernel::PartialRecord;
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct UserAccount { id: i64, name: String }
//!
//! repository!(UserAccountRepository => UserAccount);
//!
//! let context = DatabaseContext::connect(DatabaseConfig::new("postgres://localhost/app")).await?;
//! let repo: UserAccountRepository = context.repository()?;
//! let saved = repo.save(&PartialRecord::new().with("name", "alice")?).await?;
//! ```

pub mod connection;
pub mod context;
pub mod error;
pub mod pool;
pub mod postgres;
pub mod query;
pub mod repository;

pub use connection::{ConnectionPool, Lease, PooledConnection, QueryOutput};
pub use context::DatabaseContext;
pub use error::DatabaseError;
pub use pool::{create_pool, DatabaseConfig, DatabasePool};
pub use postgres::PgPooledConnection;
pub use query::{Statement, StatementKind};
pub use repository::{Entity, Repository};
