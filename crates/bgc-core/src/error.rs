//! Error types for the BGC database.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using BgcError.
pub type Result<T> = std::result::Result<T, BgcError>;

/// The declarative constraint that rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Duplicate value for a column or column set marked unique.
    Unique,
    /// A foreign key value with no matching parent row, or a parent row
    /// that still has children.
    ForeignKey,
    /// A NOT NULL column received no value.
    NotNull,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unique => "uniqueness",
            Self::ForeignKey => "referential integrity",
            Self::NotNull => "missing required field",
        };
        write!(f, "{}", s)
    }
}

/// Errors that can occur in the BGC database.
#[derive(Error, Debug)]
pub enum BgcError {
    /// A write violated a schema constraint and was rejected.
    #[error("Constraint violation ({kind}): {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },

    /// A row that must exist was not found.
    #[error("Not found: {table} row {id}")]
    NotFound { table: &'static str, id: i64 },

    /// A stored value that the row types cannot represent.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl BgcError {
    /// Create a constraint violation error.
    pub fn constraint(kind: ConstraintKind, message: impl Into<String>) -> Self {
        Self::Constraint {
            kind,
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// The violated constraint, if this is a constraint error.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            Self::Constraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Get a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Constraint { kind, .. } => match kind {
                ConstraintKind::Unique => "UNIQUE_VIOLATION",
                ConstraintKind::ForeignKey => "FOREIGN_KEY_VIOLATION",
                ConstraintKind::NotNull => "NOT_NULL_VIOLATION",
            },
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidData { .. } => "INVALID_DATA",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }
}
