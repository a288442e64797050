//! Error types for the ORM
//!
//! Every failure surfaces to the immediate caller: there is no retry,
//! no reconnection and no partial-failure recovery.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrmError {
    /// Storage is missing, closed, or the schema declarations are inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Attribute accessed while the instance cannot be read
    #[error("{entity} is {state} and cannot be accessed")]
    State { entity: String, state: String },

    /// Attribute name is not declared for this entity type
    #[error("'{attribute}' is not a declared attribute of {entity}")]
    UnknownAttribute { entity: String, attribute: String },

    /// The storage engine rejected a statement; its transaction was rolled back
    #[error("Storage error: {0}")]
    Storage(String),

    /// Load by primary key matched no row
    #[error("Record {id} not found in table '{table}'")]
    NotFound { table: String, id: i64 },

    /// Load by primary key matched more than one row
    #[error("Primary key {id} matched {count} rows in table '{table}'")]
    MultipleRows { table: String, id: i64, count: usize },

    /// Field map has no entry for the requested key
    #[error("Field '{0}' is not present on this instance")]
    MissingField(String),

    /// Value cannot be assigned to the named attribute
    #[error("Cannot assign to '{attribute}' of {entity}: {reason}")]
    InvalidAssignment {
        entity: String,
        attribute: String,
        reason: String,
    },

    /// Operation needs a persisted row but the instance has no id
    #[error("{0} has no primary key yet")]
    MissingPrimaryKey(String),
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        OrmError::Storage(err.to_string())
    }
}

impl From<ConfigError> for OrmError {
    fn from(err: ConfigError) -> Self {
        OrmError::Configuration(err.to_string())
    }
}
