//! SQLSTATE translation.

use sqlx::error::DatabaseError;
use sqlx::postgres::PgDatabaseError;

use freightline_core::StoreError;
use freightline_core::metrics::STORE_ERRORS;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const NOT_NULL_VIOLATION: &str = "23502";
const CHECK_VIOLATION: &str = "23514";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const QUERY_CANCELED: &str = "57014";

/// Translate a driver error into a [`StoreError`].
pub(crate) fn translate(err: sqlx::Error) -> StoreError {
    let translated = match &err {
        sqlx::Error::Database(db) => from_database(db.as_ref()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
        sqlx::Error::RowNotFound
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_) => StoreError::Decode(err.to_string()),
        _ => StoreError::Database(err.to_string()),
    };

    metrics::counter!(STORE_ERRORS, "kind" => kind_label(&translated)).increment(1);
    translated
}

fn from_database(db: &dyn DatabaseError) -> StoreError {
    let constraint = db.constraint().map(str::to_string);
    let pg = db.try_downcast_ref::<PgDatabaseError>();

    match db.code().as_deref() {
        Some(UNIQUE_VIOLATION) => StoreError::UniqueViolation { constraint },
        Some(FOREIGN_KEY_VIOLATION) => StoreError::ForeignKeyViolation {
            constraint,
            column: pg.and_then(PgDatabaseError::detail).and_then(key_column),
        },
        Some(NOT_NULL_VIOLATION) => StoreError::NotNullViolation {
            column: pg.and_then(PgDatabaseError::column).map(str::to_string),
        },
        Some(CHECK_VIOLATION) => StoreError::CheckViolation { constraint },
        Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED) => {
            StoreError::TransactionAborted(db.message().to_string())
        }
        // statement_timeout
        Some(QUERY_CANCELED) => StoreError::Unavailable(db.message().to_string()),
        _ => StoreError::Database(db.message().to_string()),
    }
}

/// Column list from a key detail such as
/// `Key (origin)=(ZZZ) is not present in table "airports".`
fn key_column(detail: &str) -> Option<String> {
    let rest = detail.strip_prefix("Key (")?;
    let end = rest.find(")=")?;
    Some(rest[..end].to_string())
}

const fn kind_label(err: &StoreError) -> &'static str {
    match err {
        StoreError::UniqueViolation { .. } => "unique_violation",
        StoreError::ForeignKeyViolation { .. } => "foreign_key_violation",
        StoreError::NotNullViolation { .. } => "not_null_violation",
        StoreError::CheckViolation { .. } => "check_violation",
        StoreError::TransactionAborted(_) => "transaction_aborted",
        StoreError::Unavailable(_) => "unavailable",
        StoreError::Decode(_) => "decode",
        StoreError::Database(_) => "database",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_column_from_detail() {
        assert_eq!(
            key_column("Key (origin)=(ZZZ) is not present in table \"airports\".").as_deref(),
            Some("origin")
        );
        assert_eq!(
            key_column("Key (booking_id, hop_order)=(x, 1) already exists.").as_deref(),
            Some("booking_id, hop_order")
        );
        assert_eq!(key_column("something else"), None);
    }

    #[test]
    fn test_pool_failures_are_unavailable() {
        assert!(matches!(
            translate(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            translate(sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn test_missing_row_is_decode_failure() {
        assert!(matches!(
            translate(sqlx::Error::RowNotFound),
            StoreError::Decode(_)
        ));
    }
}
