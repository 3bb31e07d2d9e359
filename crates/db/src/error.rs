//! Typed error type for the db crate.
//!
//! `StoreError` carries the *fault class* of a failed statement so the
//! service layer can map it onto the business error taxonomy without ever
//! inspecting driver internals itself.

use thiserror::Error;

/// A store-level fault, already sorted into the classes the service layer
/// cares about.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated.  `constraint` is the index name
    /// when the backend reports one (e.g. `devices_serial_active_idx`).
    #[error("unique constraint violated{}", fmt_constraint(.constraint))]
    Unique { constraint: Option<String> },

    /// A foreign key constraint was violated — the referenced row is gone.
    #[error("foreign key constraint violated{}", fmt_constraint(.constraint))]
    ForeignKey { constraint: Option<String> },

    /// A check constraint rejected the row.
    #[error("check constraint violated{}", fmt_constraint(.constraint))]
    Check { constraint: Option<String> },

    /// Deadlock or serialization failure; the whole operation may be
    /// retried from scratch.
    #[error("serialization failure or deadlock detected")]
    Serialization,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Any other driver error, unclassified.
    #[error("database error: {0}")]
    Backend(#[source] sqlx::Error),
}

fn fmt_constraint(constraint: &Option<String>) -> String {
    match constraint {
        Some(name) => format!(" ({name})"),
        None => String::new(),
    }
}

impl From<sqlx::Error> for StoreError {
    /// Sort a driver error into a fault class by SQLSTATE.
    ///
    /// 23505 unique_violation, 23503 foreign_key_violation,
    /// 23514 check_violation, 40001 serialization_failure,
    /// 40P01 deadlock_detected.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().map(str::to_owned);
            match db_err.code().as_deref() {
                Some("23505") => return StoreError::Unique { constraint },
                Some("23503") => return StoreError::ForeignKey { constraint },
                Some("23514") => return StoreError::Check { constraint },
                Some("40001") | Some("40P01") => return StoreError::Serialization,
                _ => {}
            }
        }
        StoreError::Backend(err)
    }
}
