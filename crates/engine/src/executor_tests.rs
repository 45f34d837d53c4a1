//! Tests for the retry decorator.
//!
//! These run on tokio's paused clock, so the 5-second retry delays are
//! observed exactly without any wall-clock cost.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as TimeDelta, Utc};
use uuid::Uuid;

use crate::executor::mock::MockExecutor;
use crate::executor::retry::{RetryExecutor, DEFAULT_RETRY_DELAY};
use crate::executor::Execute;
use crate::models::{Action, Headers, HttpMethod, Task, TaskStatus, Trigger};

fn sample_task() -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        name: "ping".into(),
        trigger: Trigger::OneOff { fire_at: now + TimeDelta::hours(1) },
        action: Action {
            method: HttpMethod::Get,
            url: "http://example.com/ok".into(),
            headers: Headers::new(),
            payload: None,
        },
        status: TaskStatus::Scheduled,
        created_at: now,
        updated_at: now,
        next_run: Some(now + TimeDelta::hours(1)),
        last_run: None,
    }
}

#[tokio::test(start_paused = true)]
async fn persistent_failure_makes_exactly_three_attempts() {
    let mock = Arc::new(MockExecutor::failing("http request returned status 500"));
    let retry = RetryExecutor::new(Arc::clone(&mock) as Arc<dyn Execute>);
    let task = sample_task();

    let before = tokio::time::Instant::now();
    let result = retry.execute(&task).await;

    assert_eq!(mock.call_count(), 3);
    assert!(!result.success);
    assert_eq!(result.status_code, Some(500));
    assert_eq!(result.task_id, task.id);
    // Two retries, each after the fixed delay.
    assert_eq!(before.elapsed(), 2 * DEFAULT_RETRY_DELAY);
}

#[tokio::test(start_paused = true)]
async fn success_short_circuits_the_retry_loop() {
    let mock = Arc::new(MockExecutor::succeeding());
    let retry = RetryExecutor::new(Arc::clone(&mock) as Arc<dyn Execute>);

    let before = tokio::time::Instant::now();
    let result = retry.execute(&sample_task()).await;

    assert_eq!(mock.call_count(), 1);
    assert!(result.success);
    assert_eq!(result.status_code, Some(200));
    assert_eq!(before.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn recovery_on_the_second_attempt_stops_retrying() {
    let mock = Arc::new(MockExecutor::failing_times(1));
    let retry = RetryExecutor::new(Arc::clone(&mock) as Arc<dyn Execute>);

    let result = retry.execute(&sample_task()).await;

    assert_eq!(mock.call_count(), 2);
    assert!(result.success);
    assert!(result.error_message.is_none());
}

#[tokio::test(start_paused = true)]
async fn the_last_attempt_result_is_the_one_returned() {
    // Fails twice, succeeds on the third and final attempt.
    let mock = Arc::new(MockExecutor::failing_times(2));
    let retry = RetryExecutor::new(Arc::clone(&mock) as Arc<dyn Execute>);

    let result = retry.execute(&sample_task()).await;

    assert_eq!(mock.call_count(), 3);
    assert!(result.success);
    assert_eq!(result.status_code, Some(200));
}

#[tokio::test(start_paused = true)]
async fn custom_policies_change_the_attempt_budget() {
    let mock = Arc::new(MockExecutor::failing("boom"));
    let retry = RetryExecutor::with_policy(
        Arc::clone(&mock) as Arc<dyn Execute>,
        4,
        Duration::from_secs(1),
    );

    let before = tokio::time::Instant::now();
    let result = retry.execute(&sample_task()).await;

    assert_eq!(mock.call_count(), 5);
    assert!(!result.success);
    assert_eq!(result.error_message.as_deref(), Some("boom"));
    assert_eq!(before.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn timeout_variant_retries_the_same_way() {
    let mock = Arc::new(MockExecutor::failing("timed out"));
    let retry = RetryExecutor::new(Arc::clone(&mock) as Arc<dyn Execute>);

    let result = retry
        .execute_with_timeout(&sample_task(), Duration::from_secs(3))
        .await;

    assert_eq!(mock.call_count(), 3);
    assert!(!result.success);
}
