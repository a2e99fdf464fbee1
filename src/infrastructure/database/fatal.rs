//! Fatal startup errors.
//!
//! The store cannot come up safely after these. The library returns them as
//! values; the binary logs them and exits with [`FatalKind::exit_code`].

use std::fmt;

use crate::shared::error::BoxError;

/// Category of a fatal startup failure. Each has its own exit code so the
/// failing step stays identifiable from the process status alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalKind {
    Generic,
    CreateTable,
    DbOpen,
    Ping,
    NoDriver,
    TableExists,
    ColumnExists,
    CreateColumn,
    RemoveColumn,
    RenameColumn,
    AlterColumn,
    CreateIndex,
    RemoveIndex,
    AlterPrimaryKey,
    ForeignKey,
    TriggerExists,
    Migration,
}

impl FatalKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Generic => 1,
            Self::CreateTable => 100,
            Self::DbOpen => 101,
            Self::Ping => 102,
            Self::NoDriver => 103,
            Self::TableExists => 104,
            Self::ColumnExists => 106,
            Self::CreateColumn => 110,
            Self::RemoveColumn => 113,
            Self::RenameColumn => 114,
            Self::AlterColumn => 116,
            Self::CreateIndex => 117,
            Self::RemoveIndex => 121,
            Self::AlterPrimaryKey => 139,
            Self::ForeignKey => 140,
            Self::TriggerExists => 141,
            Self::Migration => 150,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::CreateTable => "create_table",
            Self::DbOpen => "db_open",
            Self::Ping => "ping",
            Self::NoDriver => "no_driver",
            Self::TableExists => "table_exists",
            Self::ColumnExists => "column_exists",
            Self::CreateColumn => "create_column",
            Self::RemoveColumn => "remove_column",
            Self::RenameColumn => "rename_column",
            Self::AlterColumn => "alter_column",
            Self::CreateIndex => "create_index",
            Self::RemoveIndex => "remove_index",
            Self::AlterPrimaryKey => "alter_primary_key",
            Self::ForeignKey => "foreign_key",
            Self::TriggerExists => "trigger_exists",
            Self::Migration => "migration",
        }
    }
}

impl fmt::Display for FatalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecoverable schema or connection error.
#[derive(Debug, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct SchemaError {
    pub kind: FatalKind,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl SchemaError {
    pub fn new(kind: FatalKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(kind: FatalKind, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_exit_codes_are_distinct() {
        let kinds = [
            FatalKind::Generic,
            FatalKind::CreateTable,
            FatalKind::DbOpen,
            FatalKind::Ping,
            FatalKind::NoDriver,
            FatalKind::TableExists,
            FatalKind::ColumnExists,
            FatalKind::CreateColumn,
            FatalKind::RemoveColumn,
            FatalKind::RenameColumn,
            FatalKind::AlterColumn,
            FatalKind::CreateIndex,
            FatalKind::RemoveIndex,
            FatalKind::AlterPrimaryKey,
            FatalKind::ForeignKey,
            FatalKind::TriggerExists,
            FatalKind::Migration,
        ];
        let codes: HashSet<i32> = kinds.iter().map(FatalKind::exit_code).collect();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_display_names_kind() {
        let err = SchemaError::new(FatalKind::Ping, "primary unreachable");
        assert_eq!(err.to_string(), "ping failure: primary unreachable");
        assert_eq!(err.exit_code(), 102);
    }
}
