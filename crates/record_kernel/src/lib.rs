//! Record Kernel - Foundational types for the generic record repository
//!
//! This crate provides the building blocks the database layer synthesizes
//! SQL from, without performing any I/O itself:
//! - `Value`: a dynamically typed scalar bound to a positional placeholder
//! - `FieldName` and `PartialRecord`: ordered, validated (column, value) pairs
//! - `Row`: a decoded result row that maps onto a caller's entity type
//! - `TableName`: table identity, including the `<Entity>Repository` convention

pub mod error;
pub mod value;
pub mod record;
pub mod row;
pub mod table;

pub use error::CoreError;
pub use value::Value;
pub use record::{FieldName, PartialRecord};
pub use row::Row;
pub use table::TableName;
