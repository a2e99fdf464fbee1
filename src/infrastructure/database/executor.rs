//! Statement execution.
//!
//! [`DbHandle`] is a pool bound to a dialect and a routing role; [`Tx`] is a
//! transaction opened from one. Every execution is wrapped in the configured
//! query timeout, timed into the metrics registry, classified through the
//! dialect on failure, and logged when tracing is enabled.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{Any, AnyPool, Transaction};

use super::dialect::Dialect;
use super::error::DbError;
use super::row::RowExt;
use super::statement::Statement;
use crate::infrastructure::metrics::{record_db_error, record_db_query, statement_kind};

/// Which pool a handle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolRole {
    Master,
    Replica,
    Search,
    LagProbe,
}

impl PoolRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Replica => "replica",
            Self::Search => "search",
            Self::LagProbe => "lag_probe",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ExecMeta {
    dialect: Dialect,
    role: PoolRole,
    timeout: Duration,
    trace: bool,
}

async fn instrumented<T, Fut>(meta: ExecMeta, stmt: &Statement, fut: Fut) -> Result<T, DbError>
where
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let start = Instant::now();
    let result = tokio::time::timeout(meta.timeout, fut).await;
    let elapsed = start.elapsed();

    record_db_query(
        meta.role.as_str(),
        statement_kind(&stmt.sql),
        elapsed.as_secs_f64(),
    );
    if meta.trace {
        tracing::debug!(
            sql = %stmt.sql,
            args = stmt.args.len(),
            role = meta.role.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Executed statement"
        );
    }

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => {
            let err = meta.dialect.wrap_error(source);
            record_db_error(meta.role.as_str(), err.class().as_str());
            Err(err)
        }
        Err(_) => {
            record_db_error(meta.role.as_str(), "timeout");
            tracing::warn!(sql = %stmt.sql, timeout = ?meta.timeout, "Query timed out");
            Err(DbError::Timeout(meta.timeout))
        }
    }
}

/// Common execution surface of pools and transactions.
#[async_trait]
pub trait Exec: Send {
    fn dialect(&self) -> Dialect;

    async fn fetch_all(&mut self, stmt: &Statement) -> Result<Vec<AnyRow>, DbError>;

    async fn fetch_optional(&mut self, stmt: &Statement) -> Result<Option<AnyRow>, DbError>;

    /// Returns the number of affected rows.
    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DbError>;

    /// First column of the first row as an integer (`COUNT(*)` and friends).
    async fn fetch_count(&mut self, stmt: &Statement) -> Result<i64, DbError> {
        match self.fetch_optional(stmt).await? {
            Some(row) => match sqlx::Row::columns(&row).first() {
                Some(column) => {
                    let name = sqlx::Column::name(column).to_string();
                    row.int(&name)
                }
                None => Ok(0),
            },
            None => Ok(0),
        }
    }
}

/// A pool bound to a dialect and a routing role.
#[derive(Debug, Clone)]
pub struct DbHandle {
    pool: AnyPool,
    meta: ExecMeta,
}

impl DbHandle {
    pub fn new(pool: AnyPool, dialect: Dialect, role: PoolRole, timeout: Duration, trace: bool) -> Self {
        Self {
            pool,
            meta: ExecMeta {
                dialect,
                role,
                timeout,
                trace,
            },
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.meta.dialect
    }

    pub fn role(&self) -> PoolRole {
        self.meta.role
    }

    pub fn query_timeout(&self) -> Duration {
        self.meta.timeout
    }

    /// Same pool, different role label.
    pub(crate) fn with_role(&self, role: PoolRole) -> Self {
        let mut handle = self.clone();
        handle.meta.role = role;
        handle
    }

    pub async fn fetch_all(&self, stmt: &Statement) -> Result<Vec<AnyRow>, DbError> {
        instrumented(self.meta, stmt, stmt.query().fetch_all(&self.pool)).await
    }

    pub async fn fetch_optional(&self, stmt: &Statement) -> Result<Option<AnyRow>, DbError> {
        instrumented(self.meta, stmt, stmt.query().fetch_optional(&self.pool)).await
    }

    pub async fn execute(&self, stmt: &Statement) -> Result<u64, DbError> {
        instrumented(self.meta, stmt, async {
            stmt.query()
                .execute(&self.pool)
                .await
                .map(|r| r.rows_affected())
        })
        .await
    }

    pub async fn fetch_count(&self, stmt: &Statement) -> Result<i64, DbError> {
        let mut handle = self.clone();
        Exec::fetch_count(&mut handle, stmt).await
    }

    /// Execute a script without arguments (DDL).
    pub async fn execute_raw(&self, sql: &str) -> Result<u64, DbError> {
        let stmt = Statement {
            sql: sql.to_string(),
            args: Vec::new(),
        };
        self.execute(&stmt).await
    }

    pub async fn begin(&self) -> Result<Tx, DbError> {
        let meta = self.meta;
        let stmt = Statement {
            sql: "BEGIN".to_string(),
            args: Vec::new(),
        };
        let tx = instrumented(meta, &stmt, self.pool.begin()).await?;
        Ok(Tx { tx, meta })
    }

    /// Round-trip a trivial statement.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.execute_raw("SELECT 1").await.map(|_| ())
    }
}

#[async_trait]
impl Exec for DbHandle {
    fn dialect(&self) -> Dialect {
        self.meta.dialect
    }

    async fn fetch_all(&mut self, stmt: &Statement) -> Result<Vec<AnyRow>, DbError> {
        DbHandle::fetch_all(self, stmt).await
    }

    async fn fetch_optional(&mut self, stmt: &Statement) -> Result<Option<AnyRow>, DbError> {
        DbHandle::fetch_optional(self, stmt).await
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DbError> {
        DbHandle::execute(self, stmt).await
    }
}

/// An open transaction. Dropping it without [`commit`](Tx::commit) rolls back.
pub struct Tx {
    tx: Transaction<'static, Any>,
    meta: ExecMeta,
}

impl Tx {
    pub fn dialect(&self) -> Dialect {
        self.meta.dialect
    }

    pub async fn fetch_all(&mut self, stmt: &Statement) -> Result<Vec<AnyRow>, DbError> {
        let meta = self.meta;
        instrumented(meta, stmt, stmt.query().fetch_all(&mut *self.tx)).await
    }

    pub async fn fetch_optional(&mut self, stmt: &Statement) -> Result<Option<AnyRow>, DbError> {
        let meta = self.meta;
        instrumented(meta, stmt, stmt.query().fetch_optional(&mut *self.tx)).await
    }

    pub async fn execute(&mut self, stmt: &Statement) -> Result<u64, DbError> {
        let meta = self.meta;
        let conn = &mut *self.tx;
        instrumented(meta, stmt, async move {
            stmt.query().execute(conn).await.map(|r| r.rows_affected())
        })
        .await
    }

    pub async fn fetch_count(&mut self, stmt: &Statement) -> Result<i64, DbError> {
        Exec::fetch_count(self, stmt).await
    }

    pub async fn commit(self) -> Result<(), DbError> {
        let dialect = self.meta.dialect;
        self.tx.commit().await.map_err(|e| dialect.wrap_error(e))
    }

    pub async fn rollback(self) -> Result<(), DbError> {
        let dialect = self.meta.dialect;
        self.tx.rollback().await.map_err(|e| dialect.wrap_error(e))
    }
}

#[async_trait]
impl Exec for Tx {
    fn dialect(&self) -> Dialect {
        self.meta.dialect
    }

    async fn fetch_all(&mut self, stmt: &Statement) -> Result<Vec<AnyRow>, DbError> {
        Tx::fetch_all(self, stmt).await
    }

    async fn fetch_optional(&mut self, stmt: &Statement) -> Result<Option<AnyRow>, DbError> {
        Tx::fetch_optional(self, stmt).await
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DbError> {
        Tx::execute(self, stmt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::error::ErrorClass;

    #[test]
    fn test_pool_role_labels() {
        assert_eq!(PoolRole::Master.as_str(), "master");
        assert_eq!(PoolRole::Replica.as_str(), "replica");
        assert_eq!(PoolRole::Search.as_str(), "search");
        assert_eq!(PoolRole::LagProbe.as_str(), "lag_probe");
    }

    #[tokio::test]
    async fn test_instrumented_times_out() {
        let meta = ExecMeta {
            dialect: Dialect::Postgres,
            role: PoolRole::Master,
            timeout: Duration::from_millis(10),
            trace: false,
        };
        let stmt = Statement::new(Dialect::Postgres, "SELECT 1");
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, sqlx::Error>(())
        };
        let err = instrumented(meta, &stmt, slow).await.unwrap_err();
        assert!(matches!(err, DbError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_instrumented_classifies_errors() {
        let meta = ExecMeta {
            dialect: Dialect::MySql,
            role: PoolRole::Replica,
            timeout: Duration::from_secs(1),
            trace: true,
        };
        let stmt = Statement::new(Dialect::MySql, "SELECT 1");
        let failing = async { Err::<(), _>(sqlx::Error::PoolTimedOut) };
        let err = instrumented(meta, &stmt, failing).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Timeout);
    }
}
