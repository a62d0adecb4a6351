use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Schema creation failed: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("Folder already indexed: {path}")]
    ConstraintViolation {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Folder is not indexed: {0}")]
    NotIndexed(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Classify an insert failure for `path`, splitting unique-index hits from engine errors.
    pub(crate) fn from_insert(err: rusqlite::Error, path: &str) -> Self {
        let is_constraint = matches!(
            &err,
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation
        );
        if is_constraint {
            Error::ConstraintViolation {
                path: path.to_string(),
                source: err,
            }
        } else {
            Error::Database(err)
        }
    }
}
