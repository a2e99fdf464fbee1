//! # Database Migrations
//!
//! Embedded, reversible SQL migrations for both dialects, followed by a
//! post-migration pass for the schema pieces whose DDL differs per dialect.
//!
//! ```text
//! startup
//!    │
//!    ▼
//! migrate(Up) ── _sqlx_migrations ── apply pending *.up.sql in version order
//!    │
//!    ▼
//! ensure_schema ── full-text indexes, composite indexes, cascading FKs
//!    │                (each step is an IfNotExists mutator)
//!    ▼
//! store ready
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Add `<version>_<name>.up.sql` and `.down.sql` to both
//!    `migrations/postgres/` and `migrations/mysql/` with the same version.
//! 2. Never edit an applied migration; add a new one.
//! 3. Anything that needs a dialect-specific index type belongs in
//!    [`SCHEMA_FIXUPS`] instead.

use sqlx::migrate::{MigrateError, Migrator as SqlxMigrator};

use super::dialect::Dialect;
use super::executor::DbHandle;
use super::fatal::{FatalKind, SchemaError};
use super::schema::SchemaManager;

static POSTGRES_MIGRATIONS: SqlxMigrator = sqlx::migrate!("./migrations/postgres");

static MYSQL_MIGRATIONS: SqlxMigrator = sqlx::migrate!("./migrations/mysql");

/// Which way to run the migration set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// A schema change applied after the embedded migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFixup {
    FullTextIndex {
        index: &'static str,
        table: &'static str,
        columns: &'static [&'static str],
    },
    /// Expression index on PostgreSQL; plain full-text columns on MySQL.
    FullTextFuncIndex {
        index: &'static str,
        table: &'static str,
        expression: &'static str,
        columns: &'static [&'static str],
    },
    CompositeIndex {
        index: &'static str,
        table: &'static str,
        columns: &'static [&'static str],
    },
    ForeignKey {
        table: &'static str,
        column: &'static str,
        ref_table: &'static str,
        ref_column: &'static str,
        cascade: bool,
    },
}

/// Post-migration steps, applied in order.
pub const SCHEMA_FIXUPS: &[SchemaFixup] = &[
    SchemaFixup::FullTextIndex {
        index: "idx_posts_message_txt",
        table: "Posts",
        columns: &["Message"],
    },
    SchemaFixup::FullTextIndex {
        index: "idx_posts_hashtags_txt",
        table: "Posts",
        columns: &["Hashtags"],
    },
    SchemaFixup::FullTextFuncIndex {
        index: "idx_users_names_txt",
        table: "Users",
        expression: "Username || ' ' || FirstName || ' ' || LastName || ' ' || Nickname",
        columns: &["Username", "FirstName", "LastName", "Nickname"],
    },
    SchemaFixup::FullTextIndex {
        index: "idx_channels_txt",
        table: "Channels",
        columns: &["Name", "DisplayName", "Purpose"],
    },
    SchemaFixup::CompositeIndex {
        index: "idx_retentionpolicies_displayname_id",
        table: "RetentionPolicies",
        columns: &["DisplayName", "Id"],
    },
    SchemaFixup::ForeignKey {
        table: "RetentionPoliciesChannels",
        column: "PolicyId",
        ref_table: "RetentionPolicies",
        ref_column: "Id",
        cascade: true,
    },
    SchemaFixup::ForeignKey {
        table: "RetentionPoliciesTeams",
        column: "PolicyId",
        ref_table: "RetentionPolicies",
        ref_column: "Id",
        cascade: true,
    },
];

/// Runs the embedded migrations and the post-migration fixups against the
/// primary.
#[derive(Debug, Clone)]
pub struct Migrator {
    db: DbHandle,
}

impl Migrator {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    fn embedded(dialect: Dialect) -> &'static SqlxMigrator {
        match dialect {
            Dialect::Postgres => &POSTGRES_MIGRATIONS,
            Dialect::MySql => &MYSQL_MIGRATIONS,
        }
    }

    /// Apply (`Up`) or revert (`Down`) every embedded migration. Nothing to
    /// do is a successful no-op.
    pub async fn migrate(&self, direction: Direction) -> Result<(), SchemaError> {
        let dialect = self.db.dialect();
        let migrator = Self::embedded(dialect);
        tracing::info!(
            dialect = %dialect,
            direction = direction.as_str(),
            versions = migrator.iter().count(),
            "Running database migrations"
        );

        let result = match direction {
            Direction::Up => migrator.run(self.db.pool()).await,
            Direction::Down => migrator.undo(self.db.pool(), 0).await,
        };
        result.map_err(|e| migration_error(direction, e))?;

        tracing::info!(direction = direction.as_str(), "Database migrations complete");
        Ok(())
    }

    /// Apply [`SCHEMA_FIXUPS`]. Returns how many steps changed the schema.
    pub async fn ensure_schema(&self) -> Result<usize, SchemaError> {
        let schema = SchemaManager::new(self.db.clone());
        let mut changed = 0;
        for fixup in SCHEMA_FIXUPS {
            if apply(&schema, fixup).await? {
                changed += 1;
            }
        }
        if changed > 0 {
            tracing::info!(changed, "Post-migration schema changes applied");
        }
        Ok(changed)
    }

    /// `migrate(Up)` followed by `ensure_schema`.
    pub async fn run(&self) -> Result<(), SchemaError> {
        self.migrate(Direction::Up).await?;
        self.ensure_schema().await.map(|_| ())
    }
}

async fn apply(schema: &SchemaManager, fixup: &SchemaFixup) -> Result<bool, SchemaError> {
    match *fixup {
        SchemaFixup::FullTextIndex {
            index,
            table,
            columns,
        } => {
            schema
                .create_full_text_index_if_not_exists(index, table, columns)
                .await
        }
        SchemaFixup::FullTextFuncIndex {
            index,
            table,
            expression,
            columns,
        } => {
            schema
                .create_full_text_func_index_if_not_exists(index, table, expression, columns)
                .await
        }
        SchemaFixup::CompositeIndex {
            index,
            table,
            columns,
        } => {
            schema
                .create_composite_index_if_not_exists(index, table, columns)
                .await
        }
        SchemaFixup::ForeignKey {
            table,
            column,
            ref_table,
            ref_column,
            cascade,
        } => {
            schema
                .create_foreign_key_if_not_exists(table, column, ref_table, ref_column, cascade)
                .await
        }
    }
}

fn migration_error(direction: Direction, err: MigrateError) -> SchemaError {
    SchemaError::with_source(
        FatalKind::Migration,
        format!("failed to run migrations {}", direction.as_str()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_embedded_sets_have_matching_versions() {
        let pg: Vec<i64> = POSTGRES_MIGRATIONS.iter().map(|m| m.version).collect();
        let mysql: Vec<i64> = MYSQL_MIGRATIONS.iter().map(|m| m.version).collect();
        assert!(!pg.is_empty());
        assert_eq!(pg, mysql);
    }

    #[test]
    fn test_embedded_sets_are_reversible() {
        for migrator in [&POSTGRES_MIGRATIONS, &MYSQL_MIGRATIONS] {
            assert!(migrator
                .iter()
                .any(|m| m.migration_type.is_down_migration()));
        }
    }

    #[test]
    fn test_fixup_index_names_unique() {
        let mut seen = HashSet::new();
        for fixup in SCHEMA_FIXUPS {
            let name = match fixup {
                SchemaFixup::FullTextIndex { index, .. }
                | SchemaFixup::FullTextFuncIndex { index, .. }
                | SchemaFixup::CompositeIndex { index, .. } => *index,
                SchemaFixup::ForeignKey { .. } => continue,
            };
            assert!(seen.insert(name), "duplicate index {name}");
        }
    }

    #[test]
    fn test_retention_links_cascade() {
        let cascading: Vec<_> = SCHEMA_FIXUPS
            .iter()
            .filter_map(|f| match f {
                SchemaFixup::ForeignKey {
                    table,
                    ref_table: "RetentionPolicies",
                    cascade: true,
                    ..
                } => Some(*table),
                _ => None,
            })
            .collect();
        assert_eq!(
            cascading,
            vec!["RetentionPoliciesChannels", "RetentionPoliciesTeams"]
        );
    }

    #[test]
    fn test_migration_error_is_fatal_migration_kind() {
        let err = migration_error(Direction::Down, MigrateError::VersionMissing(3));
        assert_eq!(err.kind, FatalKind::Migration);
        assert_eq!(err.exit_code(), 150);
    }
}
