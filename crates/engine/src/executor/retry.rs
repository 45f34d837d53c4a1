//! Bounded-retry decorator over any [`Execute`] implementation.
//!
//! Retries run synchronously inside the firing worker, which blocks for
//! the fixed delay between attempts.  Only the last attempt's result is
//! returned; intermediate results are discarded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::models::{Task, TaskResult};
use super::Execute;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct RetryExecutor {
    inner: Arc<dyn Execute>,
    max_retries: u32,
    retry_delay: Duration,
}

impl RetryExecutor {
    /// Wrap an executor with the default policy (2 retries, 5 s apart).
    pub fn new(inner: Arc<dyn Execute>) -> Self {
        Self::with_policy(inner, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }

    pub fn with_policy(inner: Arc<dyn Execute>, max_retries: u32, retry_delay: Duration) -> Self {
        Self { inner, max_retries, retry_delay }
    }
}

#[async_trait]
impl Execute for RetryExecutor {
    async fn execute(&self, task: &Task) -> TaskResult {
        let mut last = self.inner.execute(task).await;

        for attempt in 2..=self.max_retries + 1 {
            if last.success {
                return last;
            }
            warn!(
                task_id = %task.id,
                attempt,
                error = last.error_message.as_deref().unwrap_or("unknown error"),
                "attempt failed, retrying",
            );
            tokio::time::sleep(self.retry_delay).await;
            last = self.inner.execute(task).await;
        }

        if !last.success {
            warn!(
                task_id = %task.id,
                attempts = self.max_retries + 1,
                "all attempts failed",
            );
        }
        last
    }

    async fn execute_with_timeout(&self, task: &Task, timeout: Duration) -> TaskResult {
        let mut last = self.inner.execute_with_timeout(task, timeout).await;

        for attempt in 2..=self.max_retries + 1 {
            if last.success {
                return last;
            }
            warn!(
                task_id = %task.id,
                attempt,
                error = last.error_message.as_deref().unwrap_or("unknown error"),
                "attempt failed, retrying",
            );
            tokio::time::sleep(self.retry_delay).await;
            last = self.inner.execute_with_timeout(task, timeout).await;
        }

        if !last.success {
            warn!(
                task_id = %task.id,
                attempts = self.max_retries + 1,
                "all attempts failed",
            );
        }
        last
    }
}
