//! Store Error Types
//!
//! The error taxonomy every repository returns. Driver errors are classified
//! by the dialect adapter and re-wrapped here; raw `sqlx` errors never cross
//! the repository boundary.

use std::fmt;

/// Boxed error used as the wrapped cause of [`StoreError::Internal`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Repository-level error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No row matches the lookup.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Validation rejected a value, or a unique constraint was violated.
    #[error("invalid input for {entity}: {field}={value}")]
    InvalidInput {
        entity: &'static str,
        field: String,
        value: String,
    },

    /// Optimistic compare-and-swap failed; re-read and retry.
    #[error("conflict on {entity}: {reason}")]
    Conflict { entity: &'static str, reason: String },

    /// The selected dialect does not support the requested operation.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The query exceeded the pool's query timeout.
    #[error("query timed out")]
    Timeout,

    /// A cross-table invariant was violated during a mutation.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Everything else.
    #[error("internal store error: {context}")]
    Internal {
        context: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn invalid_input(
        entity: &'static str,
        field: impl Into<String>,
        value: impl fmt::Display,
    ) -> Self {
        Self::InvalidInput {
            entity,
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            reason: reason.into(),
        }
    }

    /// Internal error without an underlying cause.
    pub fn internal(context: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            source: None,
        }
    }

    /// Internal error wrapping a cause.
    pub fn wrap<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Conflict { .. } => "conflict",
            Self::NotImplemented(_) => "not_implemented",
            Self::Timeout => "timeout",
            Self::Integrity(_) => "integrity",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Convenience alias used by every repository.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = StoreError::not_found("User", "u1");
        assert_eq!(err.to_string(), "User not found: u1");
        assert!(err.is_not_found());
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_invalid_input_carries_field_and_value() {
        let err = StoreError::invalid_input("User", "email", "same@x");
        match err {
            StoreError::InvalidInput {
                entity,
                field,
                value,
            } => {
                assert_eq!(entity, "User");
                assert_eq!(field, "email");
                assert_eq!(value, "same@x");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_wrap_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = StoreError::wrap("failed to save", io);
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "boom");
    }
}
