use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error(
        "dump file suffix must start with '.' and name an extension, for example '.jfr', but is '{0}'"
    )]
    InvalidSuffix(String),

    #[error("Failed to read dump directory '{}': {source}", directory.display())]
    ReadDir {
        directory: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RetentionResult<T> = Result<T, RetentionError>;
