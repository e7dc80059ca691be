use sea_orm::DbErr;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// No row matched the lookup.
    #[error("Record not found: {context}")]
    NotFound { context: String },

    /// Invalid input data.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A checkpoint write would have moved the position backwards.
    #[error("Checkpoint '{name}' cannot move back to position {position}")]
    CheckpointRegression { name: String, position: i64 },
}

impl RepositoryError {
    /// Create a NotFound error for a table/id lookup.
    pub fn not_found_by_id(table: &str, id: i64) -> Self {
        Self::NotFound {
            context: format!("{}.id={}", table, id),
        }
    }

    /// Create a NotFound error with free-form context.
    pub fn not_found(context: impl Into<String>) -> Self {
        Self::NotFound {
            context: context.into(),
        }
    }

    /// True when the error only says that the requested row is absent.
    ///
    /// Absence is expected on read paths (first run, genesis data) and must
    /// not be confused with an unreachable or corrupted store.
    pub fn is_no_rows(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Database(DbErr::RecordNotFound(_)) => true,
            _ => false,
        }
    }
}

/// Classify an error as "no rows found".
#[inline]
pub fn is_no_rows(err: &RepositoryError) -> bool {
    err.is_no_rows()
}

/// Turn "no rows" into `Ok(None)` while propagating every other error.
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_no_rows() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
