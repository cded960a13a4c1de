mod helpers;

use chrono::{Duration, Utc};
use helpers::*;
use mailcast::domain::entities::{JobStatus, JOB_PROCESS_TEMPLATE, JOB_SEND_EMAIL};
use mailcast::domain::ports::task_queue::TaskQueue;
use mailcast::infrastructure::workers::SqliteTaskQueue;
use serde_json::json;
use sqlx::Row;

async fn job_row(test_db: &TestDb, id: &str) -> (String, i32, Option<String>, String) {
    let row = sqlx::query(
        "SELECT status, attempts, last_error, CAST(run_at AS TEXT) as run_at FROM jobs WHERE id = ?",
    )
    .bind(id)
    .fetch_one(test_db.db.pool())
    .await
    .unwrap();
    (
        row.get("status"),
        row.get("attempts"),
        row.try_get("last_error").ok(),
        row.get("run_at"),
    )
}

#[tokio::test]
async fn test_claimed_jobs_are_invisible_to_other_fetches() {
    let test_db = setup_test_db().await;
    let queue = SqliteTaskQueue::new(test_db.db.clone());

    let first = queue
        .enqueue(JOB_SEND_EMAIL, json!({ "n": 1 }), 3)
        .await
        .unwrap();
    queue
        .enqueue(JOB_SEND_EMAIL, json!({ "n": 2 }), 3)
        .await
        .unwrap();

    let claimed = queue.fetch_jobs(&[JOB_SEND_EMAIL], 1).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, first);
    assert_eq!(claimed[0].status, JobStatus::Processing);
    assert_eq!(claimed[0].payload, json!({ "n": 1 }));
    assert_eq!(claimed[0].attempts, 0);
    assert!(claimed[0].last_error.is_none());

    let rest = queue.fetch_jobs(&[JOB_SEND_EMAIL], 10).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_ne!(rest[0].id, first);

    assert!(queue.fetch_jobs(&[JOB_SEND_EMAIL], 10).await.unwrap().is_empty());

    teardown_test_db(test_db).await;
}

#[tokio::test]
async fn test_fetch_filters_by_type_and_due_time() {
    let test_db = setup_test_db().await;
    let queue = SqliteTaskQueue::new(test_db.db.clone());

    queue
        .enqueue(JOB_PROCESS_TEMPLATE, json!({ "template_id": "t" }), 1)
        .await
        .unwrap();
    queue
        .enqueue_at(JOB_SEND_EMAIL, json!({}), Utc::now() + Duration::hours(1), 3)
        .await
        .unwrap();

    assert!(queue.fetch_jobs(&[JOB_SEND_EMAIL], 10).await.unwrap().is_empty());
    assert!(queue.fetch_jobs(&[], 10).await.unwrap().is_empty());

    let jobs = queue
        .fetch_jobs(&[JOB_SEND_EMAIL, JOB_PROCESS_TEMPLATE], 10)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_type, JOB_PROCESS_TEMPLATE);

    assert!(queue.has_active_job(JOB_SEND_EMAIL).await.unwrap());
    queue.complete_job(&jobs[0].id).await.unwrap();
    assert!(!queue.has_active_job(JOB_PROCESS_TEMPLATE).await.unwrap());

    teardown_test_db(test_db).await;
}

#[tokio::test]
async fn test_fail_job_backs_off_then_dead_letters() {
    let test_db = setup_test_db().await;
    let queue = SqliteTaskQueue::new(test_db.db.clone());

    let id = queue.enqueue(JOB_SEND_EMAIL, json!({}), 2).await.unwrap();
    queue.fetch_jobs(&[JOB_SEND_EMAIL], 1).await.unwrap();

    let before = Utc::now();
    queue.fail_job(&id, "421 try later").await.unwrap();

    let (status, attempts, last_error, run_at) = job_row(&test_db, &id).await;
    assert_eq!(status, "pending");
    assert_eq!(attempts, 1);
    assert_eq!(last_error.as_deref(), Some("421 try later"));
    let run_at = chrono::DateTime::parse_from_rfc3339(&run_at).unwrap();
    assert!(run_at >= before + Duration::seconds(29));

    // Not due during the backoff
    assert!(queue.fetch_jobs(&[JOB_SEND_EMAIL], 1).await.unwrap().is_empty());

    queue.fail_job(&id, "421 still down").await.unwrap();
    let (status, attempts, last_error, _) = job_row(&test_db, &id).await;
    assert_eq!(status, "dead_lettered");
    assert_eq!(attempts, 2);
    assert_eq!(last_error.as_deref(), Some("421 still down"));

    teardown_test_db(test_db).await;
}

#[tokio::test]
async fn test_dead_letter_skips_remaining_attempts() {
    let test_db = setup_test_db().await;
    let queue = SqliteTaskQueue::new(test_db.db.clone());

    let id = queue.enqueue(JOB_SEND_EMAIL, json!({}), 5).await.unwrap();
    queue.fetch_jobs(&[JOB_SEND_EMAIL], 1).await.unwrap();
    queue
        .dead_letter_job(&id, "550 no such user")
        .await
        .unwrap();

    let (status, attempts, _, _) = job_row(&test_db, &id).await;
    assert_eq!(status, "dead_lettered");
    assert_eq!(attempts, 1);
    assert!(!queue.has_active_job(JOB_SEND_EMAIL).await.unwrap());

    teardown_test_db(test_db).await;
}

#[tokio::test]
async fn test_expired_lock_is_reclaimed_as_an_attempt() {
    let test_db = setup_test_db().await;
    let queue = SqliteTaskQueue::new(test_db.db.clone()).with_lock_timeout(Duration::seconds(-1));

    let retried = queue.enqueue(JOB_SEND_EMAIL, json!({}), 3).await.unwrap();
    let abandoned = queue.fetch_jobs(&[JOB_SEND_EMAIL], 1).await.unwrap();
    assert_eq!(abandoned[0].id, retried);

    // The worker never reported back; the next fetch takes it again
    let again = queue.fetch_jobs(&[JOB_SEND_EMAIL], 1).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].id, retried);
    assert_eq!(again[0].attempts, 1);
    assert_eq!(again[0].last_error.as_deref(), Some("Lock expired"));

    teardown_test_db(test_db).await;
}

#[tokio::test]
async fn test_expired_lock_on_last_attempt_dead_letters() {
    let test_db = setup_test_db().await;
    let queue = SqliteTaskQueue::new(test_db.db.clone()).with_lock_timeout(Duration::seconds(-1));

    let id = queue.enqueue(JOB_SEND_EMAIL, json!({}), 1).await.unwrap();
    queue.fetch_jobs(&[JOB_SEND_EMAIL], 1).await.unwrap();

    assert!(queue.fetch_jobs(&[JOB_SEND_EMAIL], 1).await.unwrap().is_empty());

    let (status, attempts, _, _) = job_row(&test_db, &id).await;
    assert_eq!(status, "dead_lettered");
    assert_eq!(attempts, 1);

    teardown_test_db(test_db).await;
}
