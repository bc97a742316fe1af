//! Classification of the server errors the store recovers from.
//! The mongodb crate doesn't provide error code constants.

use mongodb::error::{
    Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
    UNKNOWN_TRANSACTION_COMMIT_RESULT,
};

pub const WRITE_CONFLICT: i32 = 112;
pub const DUPLICATE_KEY: i32 = 11000;

fn code(err: &DbError) -> Option<i32> {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => Some(e.code),
        ErrorKind::Command(ref e) => Some(e.code),
        _ => None,
    }
}

/// Return true if the given error is a duplicate key write error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    code(err) == Some(DUPLICATE_KEY)
}

/// Return true if a write raced another transaction for the same document.
pub fn is_write_conflict(err: &DbError) -> bool {
    code(err) == Some(WRITE_CONFLICT)
}

/// Return true if the whole transaction can be retried from the start.
/// Says nothing about what any other transaction did.
pub fn is_transient_transaction_error(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR) || is_write_conflict(err)
}

/// Return true if a commit may or may not have been applied, and can be retried.
pub fn is_unknown_commit_result(err: &DbError) -> bool {
    err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
}
