use replibench_core::prelude::{DbError, DbErrorKind};
use rusqlite::ErrorCode;

/// Classify a rusqlite error.
pub(crate) fn to_db_error(err: rusqlite::Error) -> DbError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => DbErrorKind::LockTimeout,
            ErrorCode::ConstraintViolation => DbErrorKind::ConstraintViolation,
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::PermissionDenied
            | ErrorCode::SystemIoFailure => DbErrorKind::Connectivity,
            ErrorCode::Unknown | ErrorCode::SchemaChanged | ErrorCode::TypeMismatch => {
                DbErrorKind::Statement
            }
            _ => DbErrorKind::Other,
        },
        rusqlite::Error::InvalidParameterCount(_, _)
        | rusqlite::Error::InvalidColumnIndex(_)
        | rusqlite::Error::MultipleStatement => DbErrorKind::Statement,
        _ => DbErrorKind::Other,
    };
    DbError::new(kind, err.to_string())
}
