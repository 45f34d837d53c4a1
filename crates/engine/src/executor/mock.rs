//! `MockExecutor` — a test double for [`Execute`].
//!
//! Useful in unit and integration tests where real outbound HTTP is
//! either unavailable or irrelevant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{Headers, Task, TaskResult};
use super::Execute;

/// Behaviour injected into `MockExecutor` at construction time.
pub enum MockBehaviour {
    /// Every attempt returns a 200 result.
    AlwaysSucceed,
    /// Every attempt returns a 500 result carrying this message.
    AlwaysFail(String),
    /// The first `n` attempts fail with 500, then attempts succeed.
    FailTimes(u32),
}

/// A mock executor that records every call it receives and returns a
/// programmer-specified result.
pub struct MockExecutor {
    behaviour: MockBehaviour,
    /// Task ids seen, in call order.
    calls: Arc<Mutex<Vec<Uuid>>>,
}

impl MockExecutor {
    pub fn succeeding() -> Self {
        Self::with_behaviour(MockBehaviour::AlwaysSucceed)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behaviour(MockBehaviour::AlwaysFail(message.into()))
    }

    pub fn failing_times(n: u32) -> Self {
        Self::with_behaviour(MockBehaviour::FailTimes(n))
    }

    fn with_behaviour(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of attempts this executor has served.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn result_for(&self, task: &Task, attempt: usize) -> TaskResult {
        let now = Utc::now();
        let (success, error_message) = match &self.behaviour {
            MockBehaviour::AlwaysSucceed => (true, None),
            MockBehaviour::AlwaysFail(message) => (false, Some(message.clone())),
            MockBehaviour::FailTimes(n) => {
                if attempt > *n as usize {
                    (true, None)
                } else {
                    (false, Some("http request returned status 500".to_string()))
                }
            }
        };

        TaskResult {
            id: Uuid::new_v4(),
            task_id: task.id,
            run_at: now,
            status_code: Some(if success { 200 } else { 500 }),
            success,
            response_headers: Headers::new(),
            response_body: None,
            error_message,
            duration_ms: 0,
            created_at: now,
        }
    }
}

#[async_trait]
impl Execute for MockExecutor {
    async fn execute(&self, task: &Task) -> TaskResult {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(task.id);
            calls.len()
        };
        self.result_for(task, attempt)
    }

    async fn execute_with_timeout(&self, task: &Task, _timeout: Duration) -> TaskResult {
        self.execute(task).await
    }
}
