use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection configuration: {0}")]
    ConnectionConfigError(String),

    #[error("Unsupported database scheme `{0}` (expected sqlite or postgres)")]
    UnsupportedScheme(String),

    #[error("Database error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Session {0} has already been closed")]
    SessionClosed(Uuid),

    #[error("Session {0} was created on another thread and this engine enforces same-thread use")]
    CrossThread(Uuid),
}
