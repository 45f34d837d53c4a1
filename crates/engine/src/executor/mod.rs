//! The HTTP execution pipeline: the [`Execute`] seam, the single-attempt
//! [`HttpExecutor`], and the bounded-retry [`RetryExecutor`] decorator.

pub mod http;
pub mod retry;
pub mod mock;

pub use http::HttpExecutor;
pub use retry::RetryExecutor;

use std::time::Duration;

use async_trait::async_trait;

use crate::models::{Task, TaskResult};

/// Default whole-request timeout for a single attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs one HTTP attempt for a task.
///
/// Implementations never fail: every outcome, including transport errors,
/// is folded into the returned [`TaskResult`].
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, task: &Task) -> TaskResult;

    /// Same as [`execute`](Execute::execute) with a per-invocation timeout.
    async fn execute_with_timeout(&self, task: &Task, timeout: Duration) -> TaskResult;
}
