use thiserror::Error;

/// Main error type for lotlineage
#[derive(Error, Debug)]
pub enum LineageError {
    /// Database-related errors from the reference store
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller error: bad direction, column spec or depth
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Reference store access failure that is not a raw SQLite error
    #[error("Query error: {0}")]
    Query(String),
}

impl LineageError {
    /// True for caller errors that should not be retried.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, LineageError::InvalidRequest(_))
    }

    /// Short machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LineageError::InvalidRequest(_) => "invalid_request",
            LineageError::Config(_) => "config_error",
            LineageError::Database(_)
            | LineageError::Io(_)
            | LineageError::Json(_)
            | LineageError::Query(_) => "query_error",
        }
    }
}

/// Convenient Result type using LineageError
pub type Result<T> = std::result::Result<T, LineageError>;
