//! # Storage Error Types
//!
//! Structured errors for the key-addressed storage backend. The `NotFound` class is
//! significant: [`StorageBackend::increment`](super::StorageBackend::increment) matches on it
//! to decide whether to fall back to creating the item.

use thiserror::Error;

/// Storage backend error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Item does not exist: {key}")]
    NotFound { key: String },

    #[error("Read failed for {key}: {message}")]
    Read { key: String, message: String },

    #[error("Write failed for {key}: {message}")]
    Write { key: String, message: String },

    #[error("Item serialization error: {message}")]
    Serialization { message: String },

    #[error("Storage unavailable: {table}: {message}")]
    Unavailable { table: String, message: String },

    #[error("Database error: {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("Invalid table name: {table_name}: {reason}")]
    InvalidTableName { table_name: String, reason: String },
}

impl StorageError {
    pub fn not_found(key: impl ToString) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    pub fn read(key: impl ToString, message: impl Into<String>) -> Self {
        Self::Read {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn write(key: impl ToString, message: impl Into<String>) -> Self {
        Self::Write {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn unavailable(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// True for the "does not exist" failure class
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::not_found("row"),
            sqlx::Error::PoolTimedOut => {
                StorageError::database("pool", "timed out acquiring connection")
            }
            sqlx::Error::PoolClosed => StorageError::database("pool", "connection pool is closed"),
            sqlx::Error::Database(db_err) => StorageError::database("query", db_err.to_string()),
            other => StorageError::database("connection", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::serialization(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
