//! Job compare-and-swap scenarios.

use pretty_assertions::assert_eq;

use chat_store::domain::entities::{Job, JobStatus, JobStore};
use chat_store::shared::ids::new_id;

use crate::common;

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_status_cas_succeeds_once() {
    let store = common::store().await;
    let job = Job {
        id: new_id(),
        status: JobStatus::Pending,
        ..Job::new("data_retention", Default::default())
    };
    store.job().save(&job).await.unwrap();

    let first = store
        .job()
        .update_status_optimistically(&job.id, JobStatus::Pending, JobStatus::InProgress)
        .await
        .unwrap();
    assert!(first);

    let stored = store.job().get(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::InProgress);
    assert_ne!(stored.start_at, 0);

    let second = store
        .job()
        .update_status_optimistically(&job.id, JobStatus::Pending, JobStatus::InProgress)
        .await
        .unwrap();
    assert!(!second);
    assert_eq!(store.job().get(&job.id).await.unwrap(), stored);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_update_optimistically_requires_current_status() {
    let store = common::store().await;
    let mut job = store
        .job()
        .save(&Job::new("export", Default::default()))
        .await
        .unwrap();

    job.status = JobStatus::Success;
    job.progress = 100;
    assert!(!store
        .job()
        .update_optimistically(&job, JobStatus::InProgress)
        .await
        .unwrap());
    assert!(store
        .job()
        .update_optimistically(&job, JobStatus::Pending)
        .await
        .unwrap());
    assert_eq!(store.job().get(&job.id).await.unwrap().status, JobStatus::Success);
}

#[tokio::test]
#[ignore = "requires CHAT_STORE_TEST_DATABASE_URL"]
async fn test_newest_job_by_type() {
    let store = common::store().await;
    let job_type = common::unique("type");
    let mut older = Job::new(&job_type, Default::default());
    older.create_at = 1_000;
    let mut newer = Job::new(&job_type, Default::default());
    newer.create_at = 2_000;
    store.job().save(&older).await.unwrap();
    let newer = store.job().save(&newer).await.unwrap();

    let newest = store
        .job()
        .get_newest_job_by_status_and_type(JobStatus::Pending, &job_type)
        .await
        .unwrap();
    assert_eq!(newest.id, newer.id);
    assert_eq!(
        store
            .job()
            .get_count_by_status_and_type(JobStatus::Pending, &job_type)
            .await
            .unwrap(),
        2
    );
}
