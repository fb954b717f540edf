//! Core error types used across the system

use thiserror::Error;

/// Core error type for the kernel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

impl CoreError {
    pub fn invalid_identifier(identifier: impl Into<String>) -> Self {
        CoreError::InvalidIdentifier(identifier.into())
    }
}
