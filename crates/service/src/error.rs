//! The business error taxonomy and the classifier from store faults.

use thiserror::Error;

use db::StoreError;

/// Errors surfaced by the service layer.
///
/// One sum type instead of an exception hierarchy: kind + message, with
/// the underlying store fault preserved only for the unclassified case.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad input; raised before any transaction opens (or by a store-level
    /// check constraint that slipped past input validation).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A uniqueness invariant (serial, ip) was violated.
    #[error("duplicate entity: {0}")]
    Duplicate(String),

    /// The referenced id or key does not exist among active records.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// Transient store contention; the caller may retry the whole
    /// operation.
    #[error("concurrent access conflict: {0}")]
    Concurrency(String),

    /// Unclassified store failure, not recoverable at this layer.
    #[error("data access error: {0}")]
    DataAccess(#[source] StoreError),
}

/// Map a store fault onto the business taxonomy.
///
/// Pure function; the constraint name decides which unique key the
/// message blames.
pub fn classify(err: StoreError) -> ServiceError {
    match err {
        StoreError::Unique { constraint } => {
            let message = match constraint.as_deref() {
                Some(name) if name.contains("serial") => "a device with that serial already exists",
                Some(name) if name.contains("ip") => {
                    "a configuration with that IP address already exists"
                }
                _ => "duplicate value",
            };
            ServiceError::Duplicate(message.to_owned())
        }
        StoreError::ForeignKey { .. } => {
            ServiceError::NotFound("the referenced entity does not exist".to_owned())
        }
        StoreError::Check { .. } => {
            ServiceError::Validation("the store rejected the record's values".to_owned())
        }
        StoreError::Serialization => {
            ServiceError::Concurrency("deadlock detected, retry the operation".to_owned())
        }
        other => ServiceError::DataAccess(other),
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        classify(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(constraint: &str) -> StoreError {
        StoreError::Unique {
            constraint: Some(constraint.to_owned()),
        }
    }

    #[test]
    fn unique_violations_become_duplicate_with_the_offending_key() {
        match classify(unique("devices_serial_active_idx")) {
            ServiceError::Duplicate(msg) => assert!(msg.contains("serial")),
            other => panic!("expected Duplicate, got {other:?}"),
        }
        match classify(unique("network_configs_ip_active_idx")) {
            ServiceError::Duplicate(msg) => assert!(msg.contains("IP")),
            other => panic!("expected Duplicate, got {other:?}"),
        }
        match classify(StoreError::Unique { constraint: None }) {
            ServiceError::Duplicate(msg) => assert_eq!(msg, "duplicate value"),
            other => panic!("expected Duplicate, got {other:?}"),
        }
    }

    #[test]
    fn foreign_key_violations_become_not_found() {
        let err = classify(StoreError::ForeignKey { constraint: None });
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn check_violations_become_validation() {
        let err = classify(StoreError::Check { constraint: None });
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn serialization_failures_become_concurrency() {
        let err = classify(StoreError::Serialization);
        assert!(matches!(err, ServiceError::Concurrency(_)));
    }
}
