//! Background job records.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::infrastructure::database::codec::StringMap;
use crate::shared::error::StoreResult;
use crate::shared::ids::{get_millis, new_id};

/// Lifecycle of a job.
///
/// ```text
/// pending ──► in_progress ──► success | error | warning
///    │             │
///    │             └──► cancel_requested ──► canceled
///    └──► cancel_requested | canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    InProgress,
    Success,
    Error,
    CancelRequested,
    Canceled,
    Warning,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Error => "error",
            Self::CancelRequested => "cancel_requested",
            Self::Canceled => "canceled",
            Self::Warning => "warning",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "cancel_requested" => Some(Self::CancelRequested),
            "canceled" => Some(Self::Canceled),
            "warning" => Some(Self::Warning),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Canceled | Self::Warning)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, CancelRequested)
                | (Pending, Canceled)
                | (InProgress, Success)
                | (InProgress, Error)
                | (InProgress, Warning)
                | (InProgress, CancelRequested)
                | (CancelRequested, Canceled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Job {
    #[validate(length(min = 1, max = 26))]
    pub id: String,
    #[validate(length(min = 1, max = 32))]
    pub job_type: String,
    pub priority: i64,
    pub create_at: i64,
    pub start_at: i64,
    pub last_activity_at: i64,
    pub status: JobStatus,
    #[validate(range(min = 0, max = 100))]
    pub progress: i64,
    pub data: StringMap,
}

impl Job {
    pub fn new(job_type: &str, data: StringMap) -> Self {
        Self {
            job_type: job_type.to_string(),
            data,
            ..Default::default()
        }
    }

    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        if self.create_at == 0 {
            self.create_at = get_millis();
        }
        if self.last_activity_at == 0 {
            self.last_activity_at = self.create_at;
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save(&self, job: &Job) -> StoreResult<Job>;

    async fn get(&self, id: &str) -> StoreResult<Job>;

    async fn get_all_page(&self, offset: u64, limit: u64) -> StoreResult<Vec<Job>>;

    async fn get_all_by_type(&self, job_type: &str) -> StoreResult<Vec<Job>>;

    async fn get_all_by_type_page(&self, job_type: &str, offset: u64, limit: u64) -> StoreResult<Vec<Job>>;

    async fn get_all_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>>;

    async fn get_newest_job_by_status_and_type(&self, status: JobStatus, job_type: &str) -> StoreResult<Job>;

    async fn get_newest_job_by_statuses_and_type(
        &self,
        statuses: &[JobStatus],
        job_type: &str,
    ) -> StoreResult<Job>;

    async fn get_count_by_status_and_type(&self, status: JobStatus, job_type: &str) -> StoreResult<i64>;

    /// Write `job` only if the stored status is still `current_status`.
    async fn update_optimistically(&self, job: &Job, current_status: JobStatus) -> StoreResult<bool>;

    async fn update_status(&self, id: &str, status: JobStatus) -> StoreResult<Job>;

    /// Move `id` from `current` to `new`. Sets `StartAt` when entering
    /// `in_progress`.
    async fn update_status_optimistically(
        &self,
        id: &str,
        current: JobStatus,
        new: JobStatus,
    ) -> StoreResult<bool>;

    async fn delete(&self, id: &str) -> StoreResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(JobStatus::Pending, JobStatus::InProgress, true)]
    #[test_case(JobStatus::Pending, JobStatus::Canceled, true)]
    #[test_case(JobStatus::InProgress, JobStatus::Success, true)]
    #[test_case(JobStatus::InProgress, JobStatus::Warning, true)]
    #[test_case(JobStatus::CancelRequested, JobStatus::Canceled, true)]
    #[test_case(JobStatus::Success, JobStatus::InProgress, false)]
    #[test_case(JobStatus::Pending, JobStatus::Success, false)]
    #[test_case(JobStatus::Canceled, JobStatus::Pending, false)]
    fn test_transitions(from: JobStatus, to: JobStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Success,
            JobStatus::Error,
            JobStatus::CancelRequested,
            JobStatus::Canceled,
            JobStatus::Warning,
        ] {
            assert_eq!(JobStatus::from_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_serde_uses_stored_names() {
        assert_eq!(
            serde_json::to_string(&JobStatus::CancelRequested).unwrap(),
            "\"cancel_requested\""
        );
    }

    #[test]
    fn test_pre_save() {
        let mut job = Job::new("data_retention", StringMap::new());
        job.pre_save();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.last_activity_at, job.create_at);
        assert!(job.validate().is_ok());
    }
}
