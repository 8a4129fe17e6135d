//! Error types for the pagedb engine

use crate::storage::checksum::ChecksumError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Statement text errors
    #[error("Syntax error: {0}")]
    Syntax(String),

    // Well-formed statements that reference the wrong things
    #[error("Semantic error: {0}")]
    Semantic(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // Absence errors
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Data corruption: {0}")]
    Corruption(String),
}

// Alias for compatibility
pub type PageDBError = StorageError;

/// Coarse error class, one per failure family a caller may react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Semantic,
    Storage,
    Corruption,
    NotFound,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Syntax(_) => ErrorKind::Syntax,
            StorageError::Semantic(_)
            | StorageError::ColumnNotFound(_)
            | StorageError::TypeMismatch(_)
            | StorageError::InvalidArgument(_)
            | StorageError::AlreadyExists(_) => ErrorKind::Semantic,
            StorageError::Io(_) | StorageError::Serialization(_) => ErrorKind::Storage,
            StorageError::Corruption(_) => ErrorKind::Corruption,
            StorageError::TableNotFound(_) | StorageError::IndexNotFound(_) => ErrorKind::NotFound,
        }
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        StorageError::Syntax(msg.into())
    }

    pub fn semantic(msg: impl Into<String>) -> Self {
        StorageError::Semantic(msg.into())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<ChecksumError> for StorageError {
    fn from(err: ChecksumError) -> Self {
        StorageError::Corruption(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(StorageError::syntax("x").kind(), ErrorKind::Syntax);
        assert_eq!(StorageError::ColumnNotFound("c".into()).kind(), ErrorKind::Semantic);
        assert_eq!(StorageError::TableNotFound("t".into()).kind(), ErrorKind::NotFound);
        assert_eq!(StorageError::Corruption("p".into()).kind(), ErrorKind::Corruption);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(StorageError::from(io).kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_checksum_mismatch_is_corruption() {
        let err: StorageError = ChecksumError::Mismatch { expected: 1, actual: 2, data_len: 3 }.into();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }
}
