//! Dialect Adapter
//!
//! Everything that differs between the two supported SQL dialects lives here:
//! placeholder style, identifier folding in catalog queries, case-insensitive
//! matching, upsert syntax, full-text indexes and error classification.
//!
//! D1 is PostgreSQL, D2 is MySQL.

use std::fmt;

use super::error::{DbError, ErrorClass};
use crate::config::{DRIVER_MYSQL, DRIVER_POSTGRES};
use crate::shared::error::StoreError;

/// One of the two supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    /// Resolve a configured driver name. Unknown drivers are a fatal
    /// initialization error for the caller.
    pub fn from_driver_name(name: &str) -> Result<Self, StoreError> {
        match name {
            DRIVER_POSTGRES => Ok(Self::Postgres),
            DRIVER_MYSQL => Ok(Self::MySql),
            other => Err(StoreError::NotImplemented(format!(
                "unsupported database driver {other:?}"
            ))),
        }
    }

    pub fn driver_name(&self) -> &'static str {
        match self {
            Self::Postgres => DRIVER_POSTGRES,
            Self::MySql => DRIVER_MYSQL,
        }
    }

    pub fn is_postgres(&self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Placeholder for the `n`th (1-based) argument.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::MySql => "?".to_string(),
        }
    }

    /// Rewrite `?` placeholders into the dialect's style. Question marks inside
    /// quoted literals or identifiers are left untouched.
    pub fn rebind(&self, sql: &str) -> String {
        if *self == Self::MySql {
            return sql.to_string();
        }

        let mut out = String::with_capacity(sql.len() + 16);
        let mut n = 0usize;
        let mut quote: Option<char> = None;

        for c in sql.chars() {
            match quote {
                Some(q) => {
                    out.push(c);
                    if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' | '`' => {
                        quote = Some(c);
                        out.push(c);
                    }
                    '?' => {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    }
                    _ => out.push(c),
                },
            }
        }
        out
    }

    /// Fold an identifier the way the system catalog stores it. PostgreSQL
    /// keeps unquoted identifiers in lower case.
    pub fn catalog_identifier(&self, name: &str) -> String {
        match self {
            Self::Postgres => name.to_lowercase(),
            Self::MySql => name.to_string(),
        }
    }

    /// Case-insensitive match of `column` against a single `?` argument.
    /// On MySQL the caller must lower-case the argument, see
    /// [`ilike_argument`](Self::ilike_argument).
    pub fn ilike(&self, column: &str) -> String {
        match self {
            Self::Postgres => format!("{column} ILIKE ?"),
            Self::MySql => format!("LOWER({column}) LIKE ?"),
        }
    }

    /// Prepare the argument of an [`ilike`](Self::ilike) predicate.
    pub fn ilike_argument(&self, pattern: &str) -> String {
        match self {
            Self::Postgres => pattern.to_string(),
            Self::MySql => pattern.to_lowercase(),
        }
    }

    /// Operator used for name searches: native case-insensitive LIKE on
    /// PostgreSQL, plain LIKE on MySQL.
    pub fn search_like_operator(&self) -> &'static str {
        match self {
            Self::Postgres => "ILIKE",
            Self::MySql => "LIKE",
        }
    }

    /// Suffix turning an INSERT into an upsert on `conflict_columns`.
    pub fn upsert_suffix(&self, conflict_columns: &[&str], update_columns: &[&str]) -> String {
        match self {
            Self::Postgres => {
                let sets: Vec<String> = update_columns
                    .iter()
                    .map(|c| format!("{c} = EXCLUDED.{c}"))
                    .collect();
                format!(
                    "ON CONFLICT ({}) DO UPDATE SET {}",
                    conflict_columns.join(", "),
                    sets.join(", ")
                )
            }
            Self::MySql => {
                let sets: Vec<String> = update_columns
                    .iter()
                    .map(|c| format!("{c} = VALUES({c})"))
                    .collect();
                format!("ON DUPLICATE KEY UPDATE {}", sets.join(", "))
            }
        }
    }

    /// Keyword placed after INSERT to skip duplicate rows.
    pub fn insert_ignore_keyword(&self) -> &'static str {
        match self {
            Self::Postgres => "INSERT",
            Self::MySql => "INSERT IGNORE",
        }
    }

    /// Suffix paired with [`insert_ignore_keyword`](Self::insert_ignore_keyword).
    pub fn insert_ignore_suffix(&self) -> &'static str {
        match self {
            Self::Postgres => "ON CONFLICT DO NOTHING",
            Self::MySql => "",
        }
    }

    /// DDL for a full-text index over plain columns.
    pub fn full_text_index_sql(&self, table: &str, index: &str, columns: &[&str]) -> String {
        match self {
            Self::Postgres => {
                let expr = columns
                    .iter()
                    .map(|c| format!("COALESCE({c}, '')"))
                    .collect::<Vec<_>>()
                    .join(" || ' ' || ");
                format!(
                    "CREATE INDEX {index} ON {table} USING gin(to_tsvector('english', {expr}))"
                )
            }
            Self::MySql => format!(
                "CREATE FULLTEXT INDEX {index} ON {table} ({})",
                columns.join(", ")
            ),
        }
    }

    /// DDL for a full-text index over an arbitrary expression. MySQL cannot
    /// index expressions, so the plain columns are used there.
    pub fn full_text_func_index_sql(
        &self,
        table: &str,
        index: &str,
        expression: &str,
        fallback_columns: &[&str],
    ) -> String {
        match self {
            Self::Postgres => format!(
                "CREATE INDEX {index} ON {table} USING gin(to_tsvector('english', {expression}))"
            ),
            Self::MySql => self.full_text_index_sql(table, index, fallback_columns),
        }
    }

    /// Classify a driver error by its dialect-specific code.
    pub fn classify(&self, err: &sqlx::Error) -> (ErrorClass, Option<String>) {
        match err {
            sqlx::Error::PoolTimedOut => (ErrorClass::Timeout, None),
            sqlx::Error::Database(db_err) => match self {
                Self::Postgres => {
                    let constraint = db_err.constraint().map(str::to_string);
                    let code = db_err.code();
                    (
                        classify_postgres(code.as_deref(), constraint.as_deref()),
                        constraint,
                    )
                }
                Self::MySql => {
                    let message = db_err.message();
                    let constraint = mysql_key_from_message(message);
                    let class = match db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
                        Some(mysql_err) => classify_mysql(mysql_err.number(), message),
                        None => classify_kind(db_err.kind()),
                    };
                    (class, constraint)
                }
            },
            _ => (ErrorClass::Other, None),
        }
    }

    /// Wrap a driver error into a classified [`DbError`].
    pub fn wrap_error(&self, source: sqlx::Error) -> DbError {
        let (class, constraint) = self.classify(&source);
        DbError::Sql {
            class,
            constraint,
            source,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.driver_name())
    }
}

/// Classify a PostgreSQL SQLSTATE.
pub fn classify_postgres(code: Option<&str>, constraint: Option<&str>) -> ErrorClass {
    match code {
        Some("23505") => {
            if constraint.is_some_and(|c| c.ends_with("_pkey")) {
                ErrorClass::Duplicate
            } else {
                ErrorClass::UniqueConstraint
            }
        }
        Some("23503") => ErrorClass::ForeignKeyViolation,
        Some("40P01") | Some("40001") => ErrorClass::Deadlock,
        Some("57014") => ErrorClass::Timeout,
        _ => ErrorClass::Other,
    }
}

/// Classify a MySQL server error number.
pub fn classify_mysql(number: u16, message: &str) -> ErrorClass {
    match number {
        // ER_DUP_ENTRY, ER_DUP_ENTRY_WITH_KEY_NAME
        1062 | 1586 => {
            if message.contains("'PRIMARY'") || message.contains(".PRIMARY'") {
                ErrorClass::Duplicate
            } else {
                ErrorClass::UniqueConstraint
            }
        }
        // ER_DUP_UNIQUE
        1169 => ErrorClass::UniqueConstraint,
        // ER_NO_REFERENCED_ROW(_2), ER_ROW_IS_REFERENCED(_2)
        1216 | 1217 | 1451 | 1452 => ErrorClass::ForeignKeyViolation,
        // ER_LOCK_DEADLOCK
        1213 => ErrorClass::Deadlock,
        // ER_LOCK_WAIT_TIMEOUT, ER_QUERY_INTERRUPTED, ER_QUERY_TIMEOUT
        1205 | 1317 | 3024 => ErrorClass::Timeout,
        _ => ErrorClass::Other,
    }
}

fn classify_kind(kind: sqlx::error::ErrorKind) -> ErrorClass {
    match kind {
        sqlx::error::ErrorKind::UniqueViolation => ErrorClass::UniqueConstraint,
        sqlx::error::ErrorKind::ForeignKeyViolation => ErrorClass::ForeignKeyViolation,
        _ => ErrorClass::Other,
    }
}

/// Extract the key name from "Duplicate entry 'x' for key 'Users.Email'".
fn mysql_key_from_message(message: &str) -> Option<String> {
    let (_, rest) = message.rsplit_once("for key '")?;
    let key = rest.strip_suffix('\'').unwrap_or(rest);
    Some(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("postgres", Dialect::Postgres ; "postgres driver")]
    #[test_case("mysql", Dialect::MySql ; "mysql driver")]
    fn test_from_driver_name(name: &str, expected: Dialect) {
        assert_eq!(Dialect::from_driver_name(name).unwrap(), expected);
        assert_eq!(expected.driver_name(), name);
    }

    #[test]
    fn test_unknown_driver_is_not_implemented() {
        let err = Dialect::from_driver_name("sqlite").unwrap_err();
        assert!(matches!(err, StoreError::NotImplemented(_)));
    }

    #[test]
    fn test_rebind_postgres() {
        let sql = "SELECT * FROM Users WHERE Id = ? AND Username = ?";
        assert_eq!(
            Dialect::Postgres.rebind(sql),
            "SELECT * FROM Users WHERE Id = $1 AND Username = $2"
        );
    }

    #[test]
    fn test_rebind_skips_quoted_question_marks() {
        let sql = "SELECT '?' FROM t WHERE a = ?";
        assert_eq!(Dialect::Postgres.rebind(sql), "SELECT '?' FROM t WHERE a = $1");
    }

    #[test]
    fn test_rebind_mysql_is_identity() {
        let sql = "SELECT 1 FROM t WHERE a = ?";
        assert_eq!(Dialect::MySql.rebind(sql), sql);
    }

    #[test_case(Dialect::Postgres, 3, "$3")]
    #[test_case(Dialect::MySql, 3, "?")]
    fn test_placeholder(dialect: Dialect, n: usize, expected: &str) {
        assert_eq!(dialect.placeholder(n), expected);
    }

    #[test]
    fn test_catalog_identifier() {
        assert_eq!(Dialect::Postgres.catalog_identifier("SidebarCategories"), "sidebarcategories");
        assert_eq!(Dialect::MySql.catalog_identifier("SidebarCategories"), "SidebarCategories");
    }

    #[test]
    fn test_ilike() {
        assert_eq!(Dialect::Postgres.ilike("u.Roles"), "u.Roles ILIKE ?");
        assert_eq!(Dialect::MySql.ilike("u.Roles"), "LOWER(u.Roles) LIKE ?");
        assert_eq!(Dialect::MySql.ilike_argument("%System_Admin%"), "%system_admin%");
        assert_eq!(Dialect::Postgres.ilike_argument("%System_Admin%"), "%System_Admin%");
    }

    #[test]
    fn test_upsert_suffix_postgres() {
        assert_eq!(
            Dialect::Postgres.upsert_suffix(&["UserId", "Category", "Name"], &["Value"]),
            "ON CONFLICT (UserId, Category, Name) DO UPDATE SET Value = EXCLUDED.Value"
        );
    }

    #[test]
    fn test_upsert_suffix_mysql() {
        assert_eq!(
            Dialect::MySql.upsert_suffix(&["UserId", "Category", "Name"], &["Value"]),
            "ON DUPLICATE KEY UPDATE Value = VALUES(Value)"
        );
    }

    #[test]
    fn test_full_text_index_sql() {
        assert_eq!(
            Dialect::MySql.full_text_index_sql("Posts", "idx_posts_message_txt", &["Message"]),
            "CREATE FULLTEXT INDEX idx_posts_message_txt ON Posts (Message)"
        );
        assert_eq!(
            Dialect::Postgres.full_text_index_sql("Posts", "idx_posts_message_txt", &["Message"]),
            "CREATE INDEX idx_posts_message_txt ON Posts USING gin(to_tsvector('english', COALESCE(Message, '')))"
        );
    }

    #[test_case(Some("23505"), Some("users_pkey"), ErrorClass::Duplicate)]
    #[test_case(Some("23505"), Some("users_email_key"), ErrorClass::UniqueConstraint)]
    #[test_case(Some("23503"), None, ErrorClass::ForeignKeyViolation)]
    #[test_case(Some("40P01"), None, ErrorClass::Deadlock)]
    #[test_case(Some("57014"), None, ErrorClass::Timeout)]
    #[test_case(Some("42P01"), None, ErrorClass::Other)]
    #[test_case(None, None, ErrorClass::Other)]
    fn test_classify_postgres(code: Option<&str>, constraint: Option<&str>, expected: ErrorClass) {
        assert_eq!(classify_postgres(code, constraint), expected);
    }

    #[test_case(1062, "Duplicate entry 'u1' for key 'Users.PRIMARY'", ErrorClass::Duplicate)]
    #[test_case(1062, "Duplicate entry 'a@x' for key 'Users.Email'", ErrorClass::UniqueConstraint)]
    #[test_case(1452, "Cannot add or update a child row", ErrorClass::ForeignKeyViolation)]
    #[test_case(1213, "Deadlock found", ErrorClass::Deadlock)]
    #[test_case(3024, "Query execution was interrupted", ErrorClass::Timeout)]
    #[test_case(1146, "Table doesn't exist", ErrorClass::Other)]
    fn test_classify_mysql(number: u16, message: &str, expected: ErrorClass) {
        assert_eq!(classify_mysql(number, message), expected);
    }

    #[test]
    fn test_mysql_key_from_message() {
        assert_eq!(
            mysql_key_from_message("Duplicate entry 'a@x' for key 'Users.Email'").as_deref(),
            Some("Users.Email")
        );
        assert_eq!(mysql_key_from_message("something else"), None);
    }

    #[test]
    fn test_pool_timeout_is_timeout() {
        let (class, _) = Dialect::Postgres.classify(&sqlx::Error::PoolTimedOut);
        assert_eq!(class, ErrorClass::Timeout);
    }
}
