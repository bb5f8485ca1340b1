use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Directory operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
