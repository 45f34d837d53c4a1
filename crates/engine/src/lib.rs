//! `engine` crate — domain models, cron evaluation, the HTTP execution
//! pipeline, metrics, and the live scheduler + task service.

pub mod models;
pub mod error;
pub mod cron;
pub mod executor;
pub mod metrics;
pub mod scheduler;
pub mod service;

pub use models::{Action, Task, TaskResult, Trigger};
pub use error::EngineError;
pub use cron::Schedule;
pub use metrics::Metrics;
pub use scheduler::Scheduler;
pub use service::TaskService;

#[cfg(test)]
mod cron_tests;
#[cfg(test)]
mod executor_tests;
