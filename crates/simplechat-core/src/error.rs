use std::fmt;

use simplechat_db::StoreError;
use thiserror::Error;

/// Failure categories exposed to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    InvalidOperation,
    Unauthenticated,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "NotFound",
            Self::Forbidden => "Forbidden",
            Self::Conflict => "Conflict",
            Self::InvalidOperation => "InvalidOperation",
            Self::Unauthenticated => "Unauthenticated",
            Self::Internal => "Internal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CoreError {
    pub fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            // Constraint failures that were not translated with context still
            // describe a conflicting write, not a broken store.
            Self::Storage(StoreError::UniqueViolation(_) | StoreError::ForeignKeyViolation) => {
                ErrorKind::Conflict
            }
            Self::Storage(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_the_offending_entity() {
        let err = CoreError::not_found("chat", 17);
        assert_eq!(err.to_string(), "chat 17 not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn storage_failures_map_to_kinds() {
        assert_eq!(CoreError::from(StoreError::Busy).kind(), ErrorKind::Internal);
        assert_eq!(
            CoreError::from(StoreError::UniqueViolation("x".into())).kind(),
            ErrorKind::Conflict
        );
    }
}
