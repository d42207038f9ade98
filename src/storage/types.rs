use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process kept the database locked past the busy timeout
    #[error("The feed database is locked by another process. Try again shortly.")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, recognising lock contention
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
        {
            return DatabaseError::Locked;
        }

        DatabaseError::Other(err)
    }
}

/// Feed registry conflicts surfaced to the operator verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A feed with that name already exists (note: feed names are case-insensitive).")]
    Duplicate,

    #[error("No such feed exists.")]
    NotFound,
}

// ============================================================================
// Data Structures
// ============================================================================

/// A configured feed: display name plus source URL, if one has been set.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub name: String,
    pub url: Option<String>,
}

impl Feed {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
        }
    }

    /// Case-folded name used to key watermarks and in-flight state.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}
