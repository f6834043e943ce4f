//! Error types for the database layer.

use miette::Diagnostic;
use parley_core::CoreError;
use thiserror::Error;

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error, Diagnostic)]
pub enum DbError {
    /// SQLite/sqlx error
    #[error("Database error: {0}")]
    #[diagnostic(code(parley_db::sqlx))]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    #[diagnostic(
        code(parley_db::migration),
        help("The database may have been created by a newer version of parley")
    )]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error while preparing the database directory
    #[error("IO error: {0}")]
    #[diagnostic(code(parley_db::io))]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Wrap as a core preference-store error for `operation` on `user_id`.
    pub fn into_store_error(self, operation: &'static str, user_id: &str) -> CoreError {
        CoreError::PreferenceStore {
            operation,
            user_id: user_id.to_string(),
            cause: self.to_string(),
        }
    }
}
