//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! record repository test suite.
//!
//! # Modules
//!
//! - `mock_pool`: an in-memory `ConnectionPool` that records every statement
//! - `fixtures`: sample `UserAccount` and `InventoryItem` entities, their repositories, and rows
//! - `database`: PostgreSQL testcontainer management for integration tests
//! - `assertions`: assertion helpers for placeholders and pool accounting
//! - `generators`: property-based generators for partial records

pub mod mock_pool;
pub mod fixtures;
pub mod database;
pub mod assertions;
pub mod generators;

pub use mock_pool::*;
pub use fixtures::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;

/// Installs a test subscriber honouring `RUST_LOG`, once per process
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
