//! Job repository.
//!
//! Workers hand jobs to each other with compare-and-swap updates keyed on
//! the stored status.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use validator::Validate;

use super::helpers::map_arg;
use crate::domain::entities::{Job, JobStatus, JobStore};
use crate::infrastructure::database::error::internal;
use crate::infrastructure::database::row::decode_all;
use crate::infrastructure::database::{
    DbError, Expr, FromAnyRow, PoolRouter, QueryBuilder, RowExt, SelectBuilder, UpdateBuilder,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::ids::get_millis;
use crate::shared::validation::validation_error;

const JOB_COLUMNS: &[&str] = &[
    "Id",
    "Type",
    "Priority",
    "CreateAt",
    "StartAt",
    "LastActivityAt",
    "Status",
    "Progress",
    "Data",
];

impl FromAnyRow for Job {
    fn from_row(row: &AnyRow) -> Result<Self, DbError> {
        let status = row.text("Status")?;
        Ok(Self {
            id: row.text("Id")?,
            job_type: row.text("Type")?,
            priority: row.int("Priority")?,
            create_at: row.int("CreateAt")?,
            start_at: row.int("StartAt")?,
            last_activity_at: row.int("LastActivityAt")?,
            status: JobStatus::from_str(&status)
                .ok_or_else(|| DbError::decode("Status", format!("unknown job status {status:?}")))?,
            progress: row.int("Progress")?,
            data: row.json("Data")?,
        })
    }
}

/// Status change from `current` to `new`, applied only while the row still
/// holds `current`.
fn status_swap(qb: &QueryBuilder, id: &str, current: JobStatus, new: JobStatus, now: i64) -> UpdateBuilder {
    let mut update = qb
        .update("Jobs")
        .set("Status", new.as_str())
        .set("LastActivityAt", now);
    if new == JobStatus::InProgress && current != JobStatus::InProgress {
        update = update.set("StartAt", now);
    }
    update
        .where_(Expr::eq("Id", id))
        .where_(Expr::eq("Status", current.as_str()))
}

/// SQL job store.
#[derive(Clone)]
pub struct SqlJobStore {
    router: Arc<PoolRouter>,
}

impl SqlJobStore {
    pub fn new(router: Arc<PoolRouter>) -> Self {
        Self { router }
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(self.router.dialect())
    }

    fn jobs(&self) -> SelectBuilder {
        self.qb().select(JOB_COLUMNS).from("Jobs")
    }

    async fn fetch_jobs(&self, query: SelectBuilder, context: &str) -> StoreResult<Vec<Job>> {
        let rows = self
            .router
            .replica()
            .fetch_all(&query.to_statement())
            .await
            .map_err(internal(context))?;
        Ok(decode_all(&rows)?)
    }

    async fn fetch_newest(&self, query: SelectBuilder, key: String) -> StoreResult<Job> {
        let stmt = query.order_by("CreateAt DESC").limit(1).to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get newest job"))?
            .ok_or_else(|| StoreError::not_found("Job", key))?;
        Ok(Job::from_row(&row)?)
    }
}

#[async_trait]
impl JobStore for SqlJobStore {
    async fn save(&self, job: &Job) -> StoreResult<Job> {
        let mut job = job.clone();
        job.pre_save();
        job.validate().map_err(|e| validation_error("Job", e))?;

        let stmt = self
            .qb()
            .insert("Jobs")
            .columns(JOB_COLUMNS)
            .values(vec![
                job.id.as_str().into(),
                job.job_type.as_str().into(),
                job.priority.into(),
                job.create_at.into(),
                job.start_at.into(),
                job.last_activity_at.into(),
                job.status.as_str().into(),
                job.progress.into(),
                map_arg(&job.data)?,
            ])
            .to_statement();
        self.router.master().execute(&stmt).await.map_err(|e| {
            if e.is_unique_violation() {
                StoreError::invalid_input("Job", "id", &job.id)
            } else {
                internal("failed to save job")(e)
            }
        })?;
        Ok(job)
    }

    async fn get(&self, id: &str) -> StoreResult<Job> {
        let stmt = self.jobs().where_(Expr::eq("Id", id)).to_statement();
        let row = self
            .router
            .replica()
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get job"))?
            .ok_or_else(|| StoreError::not_found("Job", id))?;
        Ok(Job::from_row(&row)?)
    }

    async fn get_all_page(&self, offset: u64, limit: u64) -> StoreResult<Vec<Job>> {
        let query = self
            .jobs()
            .order_by("CreateAt DESC")
            .limit(limit)
            .offset(offset);
        self.fetch_jobs(query, "failed to get jobs").await
    }

    async fn get_all_by_type(&self, job_type: &str) -> StoreResult<Vec<Job>> {
        let query = self
            .jobs()
            .where_(Expr::eq("Type", job_type))
            .order_by("CreateAt DESC");
        self.fetch_jobs(query, "failed to get jobs by type").await
    }

    async fn get_all_by_type_page(&self, job_type: &str, offset: u64, limit: u64) -> StoreResult<Vec<Job>> {
        let query = self
            .jobs()
            .where_(Expr::eq("Type", job_type))
            .order_by("CreateAt DESC")
            .limit(limit)
            .offset(offset);
        self.fetch_jobs(query, "failed to get jobs by type").await
    }

    async fn get_all_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        let query = self
            .jobs()
            .where_(Expr::eq("Status", status.as_str()))
            .order_by("CreateAt");
        self.fetch_jobs(query, "failed to get jobs by status").await
    }

    async fn get_newest_job_by_status_and_type(&self, status: JobStatus, job_type: &str) -> StoreResult<Job> {
        self.get_newest_job_by_statuses_and_type(&[status], job_type)
            .await
    }

    async fn get_newest_job_by_statuses_and_type(
        &self,
        statuses: &[JobStatus],
        job_type: &str,
    ) -> StoreResult<Job> {
        let query = self
            .jobs()
            .where_(Expr::in_list("Status", statuses.iter().map(JobStatus::as_str)))
            .where_(Expr::eq("Type", job_type));
        let names: Vec<&str> = statuses.iter().map(JobStatus::as_str).collect();
        self.fetch_newest(query, format!("type={job_type}, statuses={}", names.join(",")))
            .await
    }

    async fn get_count_by_status_and_type(&self, status: JobStatus, job_type: &str) -> StoreResult<i64> {
        let stmt = self
            .qb()
            .select(&["COUNT(*)"])
            .from("Jobs")
            .where_(Expr::eq("Status", status.as_str()))
            .where_(Expr::eq("Type", job_type))
            .to_statement();
        self.router
            .replica()
            .fetch_count(&stmt)
            .await
            .map_err(internal("failed to count jobs"))
    }

    async fn update_optimistically(&self, job: &Job, current_status: JobStatus) -> StoreResult<bool> {
        let stmt = self
            .qb()
            .update("Jobs")
            .set("LastActivityAt", get_millis())
            .set("Priority", job.priority)
            .set("Progress", job.progress)
            .set("Status", job.status.as_str())
            .set("StartAt", job.start_at)
            .set("Data", map_arg(&job.data)?)
            .where_(Expr::eq("Id", job.id.as_str()))
            .where_(Expr::eq("Status", current_status.as_str()))
            .to_statement();
        let count = self
            .router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to update job"))?;
        Ok(count > 0)
    }

    async fn update_status(&self, id: &str, status: JobStatus) -> StoreResult<Job> {
        let master = self.router.master();
        let stmt = self
            .qb()
            .update("Jobs")
            .set("Status", status.as_str())
            .set("LastActivityAt", get_millis())
            .where_(Expr::eq("Id", id))
            .to_statement();
        let count = master
            .execute(&stmt)
            .await
            .map_err(internal("failed to update job status"))?;
        if count == 0 {
            return Err(StoreError::not_found("Job", id));
        }

        let stmt = self.jobs().where_(Expr::eq("Id", id)).to_statement();
        let row = master
            .fetch_optional(&stmt)
            .await
            .map_err(internal("failed to get job"))?
            .ok_or_else(|| StoreError::not_found("Job", id))?;
        Ok(Job::from_row(&row)?)
    }

    async fn update_status_optimistically(&self, id: &str, current: JobStatus, new: JobStatus) -> StoreResult<bool> {
        if !current.can_transition_to(new) {
            return Err(StoreError::invalid_input(
                "Job",
                "status",
                format!("{current}->{new}"),
            ));
        }
        let stmt = status_swap(&self.qb(), id, current, new, get_millis()).to_statement();
        let count = self
            .router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to update job status"))?;
        if count > 0 {
            tracing::debug!(job_id = %id, from = %current, to = %new, "Job status changed");
        }
        Ok(count > 0)
    }

    async fn delete(&self, id: &str) -> StoreResult<String> {
        let stmt = self.qb().delete("Jobs").where_(Expr::eq("Id", id)).to_statement();
        self.router
            .master()
            .execute(&stmt)
            .await
            .map_err(internal("failed to delete job"))?;
        Ok(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{Arg, Dialect};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entering_progress_stamps_start() {
        let qb = QueryBuilder::new(Dialect::Postgres);
        let stmt = status_swap(&qb, "j1", JobStatus::Pending, JobStatus::InProgress, 42).to_statement();
        assert_eq!(
            stmt.sql,
            "UPDATE Jobs SET Status = $1, LastActivityAt = $2, StartAt = $3 WHERE Id = $4 AND Status = $5"
        );
        assert_eq!(
            stmt.args,
            vec![
                Arg::Text("in_progress".into()),
                Arg::Int(42),
                Arg::Int(42),
                Arg::Text("j1".into()),
                Arg::Text("pending".into()),
            ]
        );
    }

    #[test]
    fn test_other_transitions_keep_start() {
        let qb = QueryBuilder::new(Dialect::MySql);
        let stmt = status_swap(&qb, "j1", JobStatus::InProgress, JobStatus::Success, 7).to_statement();
        assert!(!stmt.sql.contains("StartAt"));
        assert!(stmt.sql.ends_with("WHERE Id = ? AND Status = ?"));
    }
}
