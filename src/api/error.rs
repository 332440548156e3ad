use thiserror::Error;

use crate::operations::OperationKind;
use crate::resolver::OrphanedDependent;
use crate::sqlgen::Dialect;

/// Structured error type for relmold library operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error for '{entity}': {message}")]
    Configuration { entity: String, message: String },

    #[error("Naming collision in '{scope}': '{first}' and '{second}' both map to '{physical}'")]
    NamingCollision {
        scope: String,
        physical: String,
        first: String,
        second: String,
    },

    #[error("No SQL rule for {kind} operations in dialect {dialect}")]
    UnsupportedOperation { kind: OperationKind, dialect: Dialect },

    #[error(transparent)]
    OrphanedDependent(#[from] OrphanedDependent),

    #[error("Cannot delete '{principal}' row: {count} row(s) in '{dependent}' restrict the delete")]
    DeleteRestricted {
        principal: String,
        dependent: String,
        count: usize,
    },

    #[error("Entity '{entity}' has no key value in column '{column}'")]
    MissingKey { entity: String, column: String },

    #[error("Entity '{entity}' has more than one row with {column} = {key}")]
    DuplicateKey {
        entity: String,
        column: String,
        key: String,
    },

    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    #[error("Invalid migration: {message}")]
    Migration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn configuration(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn naming_collision(
        scope: impl Into<String>,
        physical: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::NamingCollision {
            scope: scope.into(),
            physical: physical.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn unsupported(kind: OperationKind, dialect: Dialect) -> Self {
        Self::UnsupportedOperation { kind, dialect }
    }

    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    /// Whether the caller may continue after this error.
    ///
    /// Orphaned dependents are data-integrity findings reported per row;
    /// every other kind aborts the current model build, generation or plan.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::OrphanedDependent(_))
    }
}
