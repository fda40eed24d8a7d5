use sea_orm::{DbErr, SqlErr};

pub(crate) use diskwala_domain::storage::StorageError;

/// Unique-index violations surface as [`StorageError::Conflict`] so callers
/// can retry or report them; everything else is an opaque database error.
pub(crate) fn db_error(err: DbErr) -> StorageError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StorageError::Conflict(detail),
        _ => StorageError::from_source(err),
    }
}
