//! Driver-level errors.
//!
//! [`DbError`] is what the execution helpers return. It carries the class the
//! dialect adapter assigned to the driver error so repositories can branch on
//! unique and foreign-key violations without inspecting driver codes.

use std::time::Duration;

use crate::shared::error::StoreError;

/// Classification of a driver error, see [`Dialect::classify`](super::Dialect::classify).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Primary-key collision.
    Duplicate,
    /// Collision on a secondary unique index.
    UniqueConstraint,
    ForeignKeyViolation,
    Deadlock,
    Timeout,
    Other,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::UniqueConstraint => "unique_constraint",
            Self::ForeignKeyViolation => "foreign_key_violation",
            Self::Deadlock => "deadlock",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

/// Error returned by the execution helpers.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("query exceeded timeout of {0:?}")]
    Timeout(Duration),

    #[error("{} database error: {source}", class.as_str())]
    Sql {
        class: ErrorClass,
        /// Name of the violated constraint or index, when the driver reports it.
        constraint: Option<String>,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to decode column {column}: {message}")]
    Decode { column: String, message: String },
}

impl DbError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout(_) => ErrorClass::Timeout,
            Self::Sql { class, .. } => *class,
            Self::Decode { .. } => ErrorClass::Other,
        }
    }

    /// Primary-key or unique-index collision.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Duplicate | ErrorClass::UniqueConstraint
        )
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.class() == ErrorClass::ForeignKeyViolation
    }

    pub fn is_deadlock(&self) -> bool {
        self.class() == ErrorClass::Deadlock
    }

    /// Whether the violated constraint name mentions `needle` (case-insensitive).
    pub fn constraint_mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        match self {
            Self::Sql {
                constraint: Some(name),
                ..
            } => name.to_ascii_lowercase().contains(&needle),
            Self::Sql { source, .. } => source.to_string().to_ascii_lowercase().contains(&needle),
            _ => false,
        }
    }

    pub fn decode(column: &str, message: impl ToString) -> Self {
        Self::Decode {
            column: column.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Timeout(_) => StoreError::Timeout,
            DbError::Sql {
                class: ErrorClass::Timeout,
                ..
            } => StoreError::Timeout,
            other => StoreError::wrap("database operation failed", other),
        }
    }
}

/// Attach repository context to a [`DbError`] while keeping timeouts distinct.
pub(crate) fn internal(context: impl Into<String>) -> impl FnOnce(DbError) -> StoreError {
    let context = context.into();
    move |err| match err.class() {
        ErrorClass::Timeout => StoreError::Timeout,
        _ => StoreError::wrap(context, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_store_timeout() {
        let err: StoreError = DbError::Timeout(Duration::from_secs(1)).into();
        assert!(matches!(err, StoreError::Timeout));
    }

    #[test]
    fn test_other_maps_to_internal() {
        let err: StoreError = DbError::Sql {
            class: ErrorClass::Other,
            constraint: None,
            source: sqlx::Error::RowNotFound,
        }
        .into();
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn test_constraint_mentions() {
        let err = DbError::Sql {
            class: ErrorClass::UniqueConstraint,
            constraint: Some("users_email_key".into()),
            source: sqlx::Error::RowNotFound,
        };
        assert!(err.is_unique_violation());
        assert!(err.constraint_mentions("Email"));
        assert!(!err.constraint_mentions("username"));
    }

    #[test]
    fn test_internal_context_keeps_timeout() {
        let err = internal("failed")(DbError::Timeout(Duration::from_millis(5)));
        assert!(matches!(err, StoreError::Timeout));
    }
}
