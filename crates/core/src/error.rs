use stash_files::FilesError;
use stash_types::FilenameError;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsafe filename: {0}")]
    UnsafeFilename(#[from] FilenameError),
    #[error("file type is not allowed: {0}")]
    DisallowedExtension(String),
    #[error("file size {size} exceeds the maximum of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[source] FilesError),

    #[error("{operation} did not complete: {reason}")]
    Timeout {
        operation: &'static str,
        reason: String,
    },
    #[error("{operation} failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("record {id} holds an unusable filename: {reason}")]
    CorruptRecord { id: i64, reason: String },
}

impl RegistryError {
    /// Rejected before any storage or identity call was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsafeFilename(_) | Self::DisallowedExtension(_) | Self::FileTooLarge { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Splits connection-level failures (reported as timeouts) from query failures.
    pub(crate) fn from_sqlx(operation: &'static str, source: sqlx::Error) -> Self {
        match source {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => Self::Timeout {
                operation,
                reason: source.to_string(),
            },
            source => Self::Database { operation, source },
        }
    }
}

impl From<FilesError> for RegistryError {
    fn from(err: FilesError) -> Self {
        match err {
            FilesError::NotFound(name) => Self::NotFound(name),
            other => Self::Storage(other),
        }
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
