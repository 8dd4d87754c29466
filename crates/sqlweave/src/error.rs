//! Error types for sqlweave

use thiserror::Error;

/// Result type alias for sqlweave operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for query building, mapping and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// Invalid model declaration (raised while building table metadata)
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid query construction (recorded by a builder, surfaced at render time)
    #[error("Build error: {0}")]
    Build(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// SQLite driver error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// More rows than expected
    #[error("Too many rows: expected {expected}, got {got}")]
    TooManyRows { expected: usize, got: usize },

    /// A result column has no destination field on the model
    #[error("{model} does not have column \"{column}\"")]
    UnknownColumn { model: String, column: String },

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A model hook rejected the operation
    #[error("Hook error: {0}")]
    Hook(String),

    /// The dialect cannot express the requested construct
    #[error("Unsupported by {dialect}: {feature}")]
    Unsupported {
        dialect: &'static str,
        feature: &'static str,
    },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a build error
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a hook error
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    /// Create an unsupported-construct error
    pub fn unsupported(dialect: &'static str, feature: &'static str) -> Self {
        Self::Unsupported { dialect, feature }
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(expected: usize, got: usize) -> Self {
        Self::TooManyRows { expected, got }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is the "no rows" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Copy of an error recorded on a builder, returned on every render.
    ///
    /// Driver errors are not `Clone`; they are carried over as text.
    pub(crate) fn replay(&self) -> Self {
        match self {
            Self::Config(m) => Self::Config(m.clone()),
            Self::Build(m) => Self::Build(m.clone()),
            Self::Serialization(m) => Self::Serialization(m.clone()),
            Self::Decode { column, message } => Self::decode(column.clone(), message.clone()),
            Self::Unsupported { dialect, feature } => Self::Unsupported {
                dialect: *dialect,
                feature: *feature,
            },
            other => Self::Other(other.to_string()),
        }
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    #[cfg(feature = "postgres")]
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }

    /// Parse a rusqlite error into a more specific OrmError
    #[cfg(feature = "sqlite")]
    pub fn from_sqlite_error(err: rusqlite::Error) -> Self {
        use rusqlite::ffi;

        match &err {
            rusqlite::Error::QueryReturnedNoRows => {
                return Self::not_found("query returned no rows");
            }
            rusqlite::Error::SqliteFailure(code, message) => {
                let message = message.clone().unwrap_or_else(|| code.to_string());
                match code.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        return Self::UniqueViolation(message);
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Self::ForeignKeyViolation(message),
                    ffi::SQLITE_CONSTRAINT_CHECK => return Self::CheckViolation(message),
                    _ => {}
                }
            }
            _ => {}
        }
        Self::Sqlite(err)
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
