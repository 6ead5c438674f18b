use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("A stored row could not be decoded: {0}")]
    InvalidRow(String),

    #[error("Concurrent modification detected: {0}")]
    Conflict(String),

    #[error("The store is unavailable: {0}")]
    Unavailable(String),

    #[error("The requested data was not found in the database.")]
    NotFound,
}
