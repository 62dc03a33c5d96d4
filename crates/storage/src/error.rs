use std::path::PathBuf;

use earshot_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Serialization(#[from] DomainError),
    #[error("invalid user name '{0}'")]
    InvalidUser(String),
    #[error("user name '{0}' is reserved")]
    ReservedUser(String),
    #[error("user '{0}' already exists")]
    UserExists(String),
    #[error("no data directory available on this platform")]
    NoDataDir,
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
