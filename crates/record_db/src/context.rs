//! Database context
//!
//! Owns the pool built from an explicit configuration and hands out
//! repositories over it. There is no fallback connection target.

use tracing::info;

use crate::error::DatabaseError;
use crate::pool::{create_pool, DatabaseConfig, DatabasePool};
use crate::repository::{Entity, Repository};

/// Shared handle to the application's connection pool
#[derive(Debug, Clone)]
pub struct DatabaseContext {
    pool: DatabasePool,
}

impl DatabaseContext {
    /// Builds the pool described by `config`
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Configuration` for an invalid configuration
    /// and `DatabaseError::ConnectionFailed` if the database is unreachable
    pub async fn connect(config: DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = create_pool(config).await?;
        Ok(Self { pool })
    }

    /// Builds the pool from `DATABASE_*` environment variables
    pub async fn from_env() -> Result<Self, DatabaseError> {
        Self::connect(DatabaseConfig::from_env()?).await
    }

    /// Wraps an existing pool
    pub fn from_pool(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Creates the repository for `T`, sharing this context's pool
    pub fn repository<T: Entity>(&self) -> Result<Repository<T>, DatabaseError> {
        Repository::new(self.pool.clone())
    }

    /// Verifies the database answers a trivial query
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Closes the pool, waiting for leased connections to come back
    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }
}
