//! Database Backend Abstractions
//!
//! This module provides the storage boundary shared by every engine and the
//! PostgreSQL and SQLite implementations of it.

pub mod core;
pub mod postgres;
pub mod sqlite;

// Re-export core traits and types
pub use self::core::*;
pub use postgres::PostgresConnection;
pub use sqlite::SqliteConnection;

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    SQLite,
}

impl DatabaseBackendType {
    /// Detect database backend type from URL
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Some(DatabaseBackendType::PostgreSQL)
        } else if url.starts_with("sqlite:") {
            Some(DatabaseBackendType::SQLite)
        } else {
            None
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}
