//! Schema Introspector
//!
//! Catalog queries and idempotent DDL mutators. Every mutator checks the
//! catalog first and does nothing when the change is already in place, so
//! the whole set can run on every startup. Failures are fatal
//! ([`SchemaError`]); the caller decides whether to exit.

use super::dialect::Dialect;
use super::error::DbError;
use super::executor::DbHandle;
use super::fatal::{FatalKind, SchemaError};
use super::row::RowExt;
use super::statement::Statement;

/// Data type and maximum character length of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub data_type: String,
    /// Zero for non-character types.
    pub char_maximum_length: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Default,
    Unique,
    FullText,
}

/// Catalog access and DDL against the primary.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    db: DbHandle,
}

fn fatal(kind: FatalKind, what: String) -> impl FnOnce(DbError) -> SchemaError {
    move |err| SchemaError::with_source(kind, what, err)
}

impl SchemaManager {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    fn dialect(&self) -> Dialect {
        self.db.dialect()
    }

    async fn count(&self, sql: &str, args: &[&str], kind: FatalKind, what: String) -> Result<i64, SchemaError> {
        let stmt = Statement::new(self.dialect(), sql).bind_all(args.iter().copied());
        self.db.fetch_count(&stmt).await.map_err(fatal(kind, what))
    }

    async fn exec_ddl(&self, sql: &str, kind: FatalKind) -> Result<(), SchemaError> {
        tracing::info!(sql, "Applying schema change");
        self.db
            .execute_raw(sql)
            .await
            .map(|_| ())
            .map_err(fatal(kind, format!("failed to execute {sql}")))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub async fn does_table_exist(&self, table: &str) -> Result<bool, SchemaError> {
        let sql = match self.dialect() {
            Dialect::Postgres => {
                "SELECT COUNT(0) AS Value FROM pg_tables WHERE schemaname = current_schema() AND tablename = ?"
            }
            Dialect::MySql => {
                "SELECT COUNT(0) AS Value FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
            }
        };
        let name = self.dialect().catalog_identifier(table);
        let n = self
            .count(sql, &[name.as_str()], FatalKind::TableExists, format!("failed to check if table {table} exists"))
            .await?;
        Ok(n > 0)
    }

    pub async fn does_column_exist(&self, table: &str, column: &str) -> Result<bool, SchemaError> {
        let sql = match self.dialect() {
            Dialect::Postgres => {
                "SELECT COUNT(0) AS Value FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = ? AND column_name = ?"
            }
            Dialect::MySql => {
                "SELECT COUNT(0) AS Value FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?"
            }
        };
        let t = self.dialect().catalog_identifier(table);
        let c = self.dialect().catalog_identifier(column);
        let n = self
            .count(
                sql,
                &[t.as_str(), c.as_str()],
                FatalKind::ColumnExists,
                format!("failed to check if column {table}.{column} exists"),
            )
            .await?;
        Ok(n > 0)
    }

    pub async fn does_trigger_exist(&self, trigger: &str) -> Result<bool, SchemaError> {
        let sql = match self.dialect() {
            Dialect::Postgres => "SELECT COUNT(0) AS Value FROM pg_trigger WHERE tgname = ?",
            Dialect::MySql => {
                "SELECT COUNT(0) AS Value FROM information_schema.TRIGGERS \
                 WHERE TRIGGER_SCHEMA = DATABASE() AND TRIGGER_NAME = ?"
            }
        };
        let name = self.dialect().catalog_identifier(trigger);
        let n = self
            .count(sql, &[name.as_str()], FatalKind::TriggerExists, format!("failed to check if trigger {trigger} exists"))
            .await?;
        Ok(n > 0)
    }

    pub async fn get_column_info(&self, table: &str, column: &str) -> Result<Option<ColumnInfo>, SchemaError> {
        let sql = match self.dialect() {
            Dialect::Postgres => {
                "SELECT CAST(data_type AS TEXT) AS DataType, \
                 CAST(COALESCE(character_maximum_length, 0) AS BIGINT) AS CharMaximumLength \
                 FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = ? AND column_name = ?"
            }
            Dialect::MySql => {
                "SELECT CAST(DATA_TYPE AS CHAR) AS DataType, \
                 CAST(COALESCE(CHARACTER_MAXIMUM_LENGTH, 0) AS SIGNED) AS CharMaximumLength \
                 FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?"
            }
        };
        let stmt = Statement::new(self.dialect(), sql)
            .bind(self.dialect().catalog_identifier(table))
            .bind(self.dialect().catalog_identifier(column));
        let what = format!("failed to get column info for {table}.{column}");
        let row = self
            .db
            .fetch_optional(&stmt)
            .await
            .map_err(fatal(FatalKind::ColumnExists, what.clone()))?;

        row.map(|row| {
            Ok(ColumnInfo {
                data_type: row.text("DataType")?,
                char_maximum_length: row.int("CharMaximumLength")?,
            })
        })
        .transpose()
        .map_err(fatal(FatalKind::ColumnExists, what))
    }

    /// Whether a reported data type is the dialect's variable-length string.
    pub fn is_varchar(&self, column_type: &str) -> bool {
        is_varchar(self.dialect(), column_type)
    }

    async fn does_index_exist(&self, table: &str, index: &str) -> Result<bool, SchemaError> {
        let sql = match self.dialect() {
            Dialect::Postgres => {
                "SELECT COUNT(0) AS Value FROM pg_indexes \
                 WHERE schemaname = current_schema() AND tablename = ? AND indexname = ?"
            }
            Dialect::MySql => {
                "SELECT COUNT(0) AS Value FROM information_schema.statistics \
                 WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ?"
            }
        };
        let t = self.dialect().catalog_identifier(table);
        let i = self.dialect().catalog_identifier(index);
        let n = self
            .count(sql, &[t.as_str(), i.as_str()], FatalKind::CreateIndex, format!("failed to check index {index}"))
            .await?;
        Ok(n > 0)
    }

    async fn does_foreign_key_exist(&self, table: &str, name: &str) -> Result<bool, SchemaError> {
        let sql = match self.dialect() {
            Dialect::Postgres => {
                "SELECT COUNT(0) AS Value FROM information_schema.table_constraints \
                 WHERE constraint_schema = current_schema() AND table_name = ? \
                 AND constraint_name = ? AND constraint_type = 'FOREIGN KEY'"
            }
            Dialect::MySql => {
                "SELECT COUNT(0) AS Value FROM information_schema.TABLE_CONSTRAINTS \
                 WHERE CONSTRAINT_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                 AND CONSTRAINT_NAME = ? AND CONSTRAINT_TYPE = 'FOREIGN KEY'"
            }
        };
        let t = self.dialect().catalog_identifier(table);
        let n = self.dialect().catalog_identifier(name);
        let count = self
            .count(sql, &[t.as_str(), n.as_str()], FatalKind::ForeignKey, format!("failed to check foreign key {name}"))
            .await?;
        Ok(count > 0)
    }

    /// Current primary key as a comma-separated, lower-cased column list,
    /// with the constraint name on PostgreSQL.
    async fn current_primary_key(&self, table: &str) -> Result<(String, Option<String>), SchemaError> {
        let sql = match self.dialect() {
            Dialect::Postgres => {
                "SELECT c.conname AS Name, \
                 string_agg(CAST(a.attname AS TEXT), ',' ORDER BY array_position(c.conkey, a.attnum)) AS Columns \
                 FROM pg_constraint c \
                 JOIN pg_class t ON t.oid = c.conrelid \
                 JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = ANY(c.conkey) \
                 WHERE c.contype = 'p' AND t.relname = ? AND t.relnamespace = CAST(current_schema() AS regnamespace) \
                 GROUP BY c.conname"
            }
            Dialect::MySql => {
                "SELECT CAST(index_name AS CHAR) AS Name, \
                 CAST(GROUP_CONCAT(column_name ORDER BY seq_in_index) AS CHAR) AS Columns \
                 FROM information_schema.statistics \
                 WHERE table_schema = DATABASE() AND table_name = ? AND index_name = 'PRIMARY' \
                 GROUP BY index_name"
            }
        };
        let stmt = Statement::new(self.dialect(), sql).bind(self.dialect().catalog_identifier(table));
        let what = format!("failed to read primary key of {table}");
        let row = self
            .db
            .fetch_optional(&stmt)
            .await
            .map_err(fatal(FatalKind::AlterPrimaryKey, what.clone()))?;
        match row {
            Some(row) => {
                let columns = row
                    .text("Columns")
                    .map_err(fatal(FatalKind::AlterPrimaryKey, what.clone()))?;
                let name = row
                    .text("Name")
                    .map_err(fatal(FatalKind::AlterPrimaryKey, what))?;
                Ok((columns.to_lowercase(), Some(name)))
            }
            None => Ok((String::new(), None)),
        }
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    pub async fn create_column_if_not_exists(
        &self,
        table: &str,
        column: &str,
        postgres_type: &str,
        mysql_type: &str,
        default: &str,
    ) -> Result<bool, SchemaError> {
        if self.does_column_exist(table, column).await? {
            return Ok(false);
        }
        let sql = add_column_sql(self.dialect(), table, column, postgres_type, mysql_type, Some(default));
        self.exec_ddl(&sql, FatalKind::CreateColumn).await?;
        Ok(true)
    }

    pub async fn create_column_if_not_exists_no_default(
        &self,
        table: &str,
        column: &str,
        postgres_type: &str,
        mysql_type: &str,
    ) -> Result<bool, SchemaError> {
        if self.does_column_exist(table, column).await? {
            return Ok(false);
        }
        let sql = add_column_sql(self.dialect(), table, column, postgres_type, mysql_type, None);
        self.exec_ddl(&sql, FatalKind::CreateColumn).await?;
        Ok(true)
    }

    pub async fn remove_column_if_exists(&self, table: &str, column: &str) -> Result<bool, SchemaError> {
        if !self.does_column_exist(table, column).await? {
            return Ok(false);
        }
        self.exec_ddl(&format!("ALTER TABLE {table} DROP COLUMN {column}"), FatalKind::RemoveColumn)
            .await?;
        Ok(true)
    }

    /// `column_type` is needed by MySQL, which renames through `CHANGE`.
    pub async fn rename_column_if_exists(
        &self,
        table: &str,
        old_column: &str,
        new_column: &str,
        column_type: &str,
    ) -> Result<bool, SchemaError> {
        if !self.does_column_exist(table, old_column).await? {
            return Ok(false);
        }
        let sql = rename_column_sql(self.dialect(), table, old_column, new_column, column_type);
        self.exec_ddl(&sql, FatalKind::RenameColumn).await?;
        Ok(true)
    }

    pub async fn alter_column_type_if_exists(
        &self,
        table: &str,
        column: &str,
        postgres_type: &str,
        mysql_type: &str,
    ) -> Result<bool, SchemaError> {
        if !self.does_column_exist(table, column).await? {
            return Ok(false);
        }
        let sql = alter_column_type_sql(self.dialect(), table, column, postgres_type, mysql_type);
        self.exec_ddl(&sql, FatalKind::AlterColumn).await?;
        Ok(true)
    }

    /// Set the column default. A `None` default for the active dialect is a no-op.
    pub async fn alter_default_if_column_exists(
        &self,
        table: &str,
        column: &str,
        postgres_default: Option<&str>,
        mysql_default: Option<&str>,
    ) -> Result<bool, SchemaError> {
        let default = match self.dialect() {
            Dialect::Postgres => postgres_default,
            Dialect::MySql => mysql_default,
        };
        let Some(default) = default else {
            return Ok(false);
        };
        if !self.does_column_exist(table, column).await? {
            return Ok(false);
        }
        self.exec_ddl(
            &format!("ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default}"),
            FatalKind::AlterColumn,
        )
        .await?;
        Ok(true)
    }

    pub async fn remove_default_if_column_exists(&self, table: &str, column: &str) -> Result<bool, SchemaError> {
        if !self.does_column_exist(table, column).await? {
            return Ok(false);
        }
        self.exec_ddl(
            &format!("ALTER TABLE {table} ALTER COLUMN {column} DROP DEFAULT"),
            FatalKind::AlterColumn,
        )
        .await?;
        Ok(true)
    }

    /// Replace the primary key of `table` with `columns` unless it already
    /// matches. The drop and re-create happen atomically.
    pub async fn alter_primary_key(&self, table: &str, columns: &[&str]) -> Result<bool, SchemaError> {
        let (current, constraint) = self.current_primary_key(table).await?;
        let desired = columns.join(",").to_lowercase();
        if current == desired {
            return Ok(false);
        }

        let what = format!("failed to alter primary key of {table}");
        match self.dialect() {
            Dialect::Postgres => {
                let mut tx = self
                    .db
                    .begin()
                    .await
                    .map_err(fatal(FatalKind::AlterPrimaryKey, what.clone()))?;
                if let Some(name) = constraint {
                    let drop = Statement::new(Dialect::Postgres, &format!("ALTER TABLE {table} DROP CONSTRAINT {name}"));
                    tx.execute(&drop)
                        .await
                        .map_err(fatal(FatalKind::AlterPrimaryKey, what.clone()))?;
                }
                let add = Statement::new(
                    Dialect::Postgres,
                    &format!("ALTER TABLE {table} ADD PRIMARY KEY ({})", columns.join(", ")),
                );
                tx.execute(&add)
                    .await
                    .map_err(fatal(FatalKind::AlterPrimaryKey, what.clone()))?;
                tx.commit().await.map_err(fatal(FatalKind::AlterPrimaryKey, what))?;
            }
            Dialect::MySql => {
                let drop = if constraint.is_some() { "DROP PRIMARY KEY, " } else { "" };
                self.exec_ddl(
                    &format!("ALTER TABLE {table} {drop}ADD PRIMARY KEY ({})", columns.join(", ")),
                    FatalKind::AlterPrimaryKey,
                )
                .await?;
            }
        }
        tracing::info!(table, from = %current, to = %desired, "Altered primary key");
        Ok(true)
    }

    async fn create_index_if_not_exists_inner(
        &self,
        index: &str,
        table: &str,
        columns: &[&str],
        kind: IndexKind,
    ) -> Result<bool, SchemaError> {
        if self.does_index_exist(table, index).await? {
            return Ok(false);
        }
        let sql = create_index_sql(self.dialect(), index, table, columns, kind);
        self.exec_ddl(&sql, FatalKind::CreateIndex).await?;
        Ok(true)
    }

    pub async fn create_index_if_not_exists(&self, index: &str, table: &str, column: &str) -> Result<bool, SchemaError> {
        self.create_index_if_not_exists_inner(index, table, &[column], IndexKind::Default)
            .await
    }

    pub async fn create_unique_index_if_not_exists(
        &self,
        index: &str,
        table: &str,
        column: &str,
    ) -> Result<bool, SchemaError> {
        self.create_index_if_not_exists_inner(index, table, &[column], IndexKind::Unique)
            .await
    }

    pub async fn create_composite_index_if_not_exists(
        &self,
        index: &str,
        table: &str,
        columns: &[&str],
    ) -> Result<bool, SchemaError> {
        self.create_index_if_not_exists_inner(index, table, columns, IndexKind::Default)
            .await
    }

    pub async fn create_full_text_index_if_not_exists(
        &self,
        index: &str,
        table: &str,
        columns: &[&str],
    ) -> Result<bool, SchemaError> {
        self.create_index_if_not_exists_inner(index, table, columns, IndexKind::FullText)
            .await
    }

    /// Full-text index over an expression; MySQL indexes `fallback_columns`.
    pub async fn create_full_text_func_index_if_not_exists(
        &self,
        index: &str,
        table: &str,
        expression: &str,
        fallback_columns: &[&str],
    ) -> Result<bool, SchemaError> {
        if self.does_index_exist(table, index).await? {
            return Ok(false);
        }
        let sql = self
            .dialect()
            .full_text_func_index_sql(table, index, expression, fallback_columns);
        self.exec_ddl(&sql, FatalKind::CreateIndex).await?;
        Ok(true)
    }

    pub async fn remove_index_if_exists(&self, index: &str, table: &str) -> Result<bool, SchemaError> {
        if !self.does_index_exist(table, index).await? {
            return Ok(false);
        }
        let sql = match self.dialect() {
            Dialect::Postgres => format!("DROP INDEX {index}"),
            Dialect::MySql => format!("DROP INDEX {index} ON {table}"),
        };
        self.exec_ddl(&sql, FatalKind::RemoveIndex).await?;
        Ok(true)
    }

    /// Add `FK_{table}_{ref_table}` unless it exists. A concurrent creator
    /// winning the race counts as success.
    pub async fn create_foreign_key_if_not_exists(
        &self,
        table: &str,
        column: &str,
        ref_table: &str,
        ref_column: &str,
        on_delete_cascade: bool,
    ) -> Result<bool, SchemaError> {
        let name = foreign_key_name(table, ref_table);
        if self.does_foreign_key_exist(table, &name).await? {
            return Ok(false);
        }
        let sql = foreign_key_sql(&name, table, column, ref_table, ref_column, on_delete_cascade);
        tracing::info!(sql = %sql, "Applying schema change");
        match self.db.execute_raw(&sql).await {
            Ok(_) => Ok(true),
            Err(err) if is_already_exists(&err) => Ok(false),
            Err(err) => Err(SchemaError::with_source(
                FatalKind::ForeignKey,
                format!("failed to create foreign key {name}"),
                err,
            )),
        }
    }
}

pub fn is_varchar(dialect: Dialect, column_type: &str) -> bool {
    match dialect {
        Dialect::Postgres => column_type.eq_ignore_ascii_case("character varying"),
        Dialect::MySql => column_type.eq_ignore_ascii_case("varchar"),
    }
}

fn add_column_sql(
    dialect: Dialect,
    table: &str,
    column: &str,
    postgres_type: &str,
    mysql_type: &str,
    default: Option<&str>,
) -> String {
    let column_type = match dialect {
        Dialect::Postgres => postgres_type,
        Dialect::MySql => mysql_type,
    };
    match default {
        Some(default) => format!(
            "ALTER TABLE {table} ADD {column} {column_type} DEFAULT '{}'",
            default.replace('\'', "''")
        ),
        None => format!("ALTER TABLE {table} ADD {column} {column_type}"),
    }
}

fn rename_column_sql(dialect: Dialect, table: &str, old: &str, new: &str, column_type: &str) -> String {
    match dialect {
        Dialect::Postgres => format!("ALTER TABLE {table} RENAME COLUMN {old} TO {new}"),
        Dialect::MySql => format!("ALTER TABLE {table} CHANGE {old} {new} {column_type}"),
    }
}

fn alter_column_type_sql(dialect: Dialect, table: &str, column: &str, postgres_type: &str, mysql_type: &str) -> String {
    match dialect {
        Dialect::Postgres => format!("ALTER TABLE {table} ALTER COLUMN {column} TYPE {postgres_type}"),
        Dialect::MySql => format!("ALTER TABLE {table} MODIFY {column} {mysql_type}"),
    }
}

fn create_index_sql(dialect: Dialect, index: &str, table: &str, columns: &[&str], kind: IndexKind) -> String {
    match kind {
        IndexKind::FullText => dialect.full_text_index_sql(table, index, columns),
        IndexKind::Unique => format!("CREATE UNIQUE INDEX {index} ON {table} ({})", columns.join(", ")),
        IndexKind::Default => format!("CREATE INDEX {index} ON {table} ({})", columns.join(", ")),
    }
}

fn foreign_key_name(table: &str, ref_table: &str) -> String {
    format!("FK_{table}_{ref_table}")
}

fn foreign_key_sql(name: &str, table: &str, column: &str, ref_table: &str, ref_column: &str, cascade: bool) -> String {
    let on_delete = if cascade { " ON DELETE CASCADE" } else { "" };
    format!("ALTER TABLE {table} ADD CONSTRAINT {name} FOREIGN KEY ({column}) REFERENCES {ref_table}({ref_column}){on_delete}")
}

fn is_already_exists(err: &DbError) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("already exists") || message.contains("duplicate foreign key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(Dialect::Postgres, "character varying", true)]
    #[test_case(Dialect::Postgres, "varchar", false)]
    #[test_case(Dialect::MySql, "varchar", true)]
    #[test_case(Dialect::MySql, "text", false)]
    fn test_is_varchar(dialect: Dialect, column_type: &str, expected: bool) {
        assert_eq!(is_varchar(dialect, column_type), expected);
    }

    #[test]
    fn test_add_column_sql() {
        assert_eq!(
            add_column_sql(Dialect::Postgres, "Users", "Timezone", "varchar(256)", "text", Some("")),
            "ALTER TABLE Users ADD Timezone varchar(256) DEFAULT ''"
        );
        assert_eq!(
            add_column_sql(Dialect::MySql, "Users", "Timezone", "varchar(256)", "text", None),
            "ALTER TABLE Users ADD Timezone text"
        );
        assert_eq!(
            add_column_sql(Dialect::MySql, "Teams", "Type", "varchar(2)", "varchar(2)", Some("O'")),
            "ALTER TABLE Teams ADD Type varchar(2) DEFAULT 'O'''"
        );
    }

    #[test_case(Dialect::Postgres, "ALTER TABLE Posts RENAME COLUMN ParentId TO RootParent")]
    #[test_case(Dialect::MySql, "ALTER TABLE Posts CHANGE ParentId RootParent varchar(26)")]
    fn test_rename_column_sql(dialect: Dialect, expected: &str) {
        assert_eq!(
            rename_column_sql(dialect, "Posts", "ParentId", "RootParent", "varchar(26)"),
            expected
        );
    }

    #[test_case(Dialect::Postgres, "ALTER TABLE Posts ALTER COLUMN Message TYPE varchar(65535)")]
    #[test_case(Dialect::MySql, "ALTER TABLE Posts MODIFY Message text")]
    fn test_alter_column_type_sql(dialect: Dialect, expected: &str) {
        assert_eq!(
            alter_column_type_sql(dialect, "Posts", "Message", "varchar(65535)", "text"),
            expected
        );
    }

    #[test]
    fn test_create_index_sql() {
        assert_eq!(
            create_index_sql(
                Dialect::Postgres,
                "idx_retentionpolicies_displayname_id",
                "RetentionPolicies",
                &["DisplayName", "Id"],
                IndexKind::Default
            ),
            "CREATE INDEX idx_retentionpolicies_displayname_id ON RetentionPolicies (DisplayName, Id)"
        );
        assert_eq!(
            create_index_sql(Dialect::MySql, "idx_users_email_unique", "Users", &["Email"], IndexKind::Unique),
            "CREATE UNIQUE INDEX idx_users_email_unique ON Users (Email)"
        );
        assert_eq!(
            create_index_sql(Dialect::MySql, "idx_posts_message_txt", "Posts", &["Message"], IndexKind::FullText),
            "CREATE FULLTEXT INDEX idx_posts_message_txt ON Posts (Message)"
        );
    }

    #[test]
    fn test_foreign_key_sql() {
        let name = foreign_key_name("RetentionPoliciesChannels", "RetentionPolicies");
        assert_eq!(name, "FK_RetentionPoliciesChannels_RetentionPolicies");
        assert_eq!(
            foreign_key_sql(&name, "RetentionPoliciesChannels", "PolicyId", "RetentionPolicies", "Id", true),
            "ALTER TABLE RetentionPoliciesChannels ADD CONSTRAINT FK_RetentionPoliciesChannels_RetentionPolicies \
             FOREIGN KEY (PolicyId) REFERENCES RetentionPolicies(Id) ON DELETE CASCADE"
        );
    }
}
