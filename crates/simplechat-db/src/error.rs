use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

/// Storage failures, with SQLite constraint codes already classified so callers
/// never have to look at driver-specific error values.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated")]
    ForeignKeyViolation,

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    #[error("database is busy")]
    Busy,

    #[error("database lock poisoned")]
    Poisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl StoreError {
    /// Whether re-running the same transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref code, ref message) = err {
            let detail = message.clone().unwrap_or_default();
            match code.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => return Self::Busy,
                ErrorCode::ConstraintViolation => match code.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        return Self::UniqueViolation(detail);
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Self::ForeignKeyViolation,
                    ffi::SQLITE_CONSTRAINT_CHECK => return Self::CheckViolation(detail),
                    _ => {}
                },
                _ => {}
            }
        }
        Self::Sqlite(err)
    }
}
