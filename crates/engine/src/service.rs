//! Orchestration between the control API, the store, and the scheduler.
//!
//! Every durable change is mirrored to the live schedule: create persists
//! then arms, update unschedules before persisting and re-arms afterwards,
//! cancel unschedules before marking.  Store errors surface unchanged.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use db::models::TaskStatus;
use db::repository::{results as result_repo, tasks as task_repo};
use db::DbPool;

use crate::cron::Schedule;
use crate::models::{Action, Task, TaskResult, Trigger};
use crate::scheduler::Scheduler;
use crate::EngineError;

/// Input for creating a task.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub name: String,
    pub trigger: Trigger,
    pub action: Action,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub name: Option<String>,
    pub trigger: Option<Trigger>,
    pub action: Option<Action>,
}

#[derive(Clone)]
pub struct TaskService {
    pool: DbPool,
    scheduler: Scheduler,
}

impl TaskService {
    pub fn new(pool: DbPool, scheduler: Scheduler) -> Self {
        Self { pool, scheduler }
    }

    /// Validate, persist, then arm.
    pub async fn create_task(&self, req: CreateTask) -> Result<Task, EngineError> {
        let now = Utc::now();
        validate_name(&req.name)?;
        validate_action(&req.action)?;
        let next_run = validate_trigger(&req.trigger, now)?;

        let task = Task {
            id: Uuid::new_v4(),
            name: req.name,
            trigger: req.trigger,
            action: req.action,
            status: TaskStatus::Scheduled,
            created_at: now,
            updated_at: now,
            next_run,
            last_run: None,
        };

        let row = task_repo::insert_task(&self.pool, &task.to_row()).await?;
        let task = Task::from_row(row)?;
        self.scheduler.arm(&task);
        Ok(task)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task, EngineError> {
        let row = task_repo::get_task(&self.pool, id).await?;
        Task::from_row(row)
    }

    /// Unschedule, apply the patch, persist, and re-arm if the task is
    /// still scheduled.
    pub async fn update_task(&self, id: Uuid, patch: UpdateTask) -> Result<Task, EngineError> {
        let mut task = self.get_task(id).await?;
        self.scheduler.unschedule(id);

        if let Some(name) = patch.name {
            validate_name(&name)?;
            task.name = name;
        }
        if let Some(action) = patch.action {
            validate_action(&action)?;
            task.action = action;
        }
        if let Some(trigger) = patch.trigger {
            task.next_run = validate_trigger(&trigger, Utc::now())?;
            task.trigger = trigger;
        }

        let row = task_repo::update_task(&self.pool, &task.to_row()).await?;
        let task = Task::from_row(row)?;
        if task.status == TaskStatus::Scheduled {
            self.scheduler.arm(&task);
        }
        Ok(task)
    }

    /// Cancel a task.  Idempotent on an already-cancelled task; cancelling
    /// a completed task is a conflict.
    pub async fn cancel_task(&self, id: Uuid) -> Result<(), EngineError> {
        let task = self.get_task(id).await?;
        match task.status {
            TaskStatus::Cancelled => Ok(()),
            TaskStatus::Completed => {
                Err(EngineError::Conflict("task already completed".into()))
            }
            TaskStatus::Scheduled => {
                self.scheduler.unschedule(id);
                task_repo::mark_cancelled(&self.pool, id).await?;
                Ok(())
            }
        }
    }

    /// Fire a scheduled task immediately on a worker, outside its trigger.
    pub async fn run_now(&self, id: Uuid) -> Result<(), EngineError> {
        let task = self.get_task(id).await?;
        if task.status != TaskStatus::Scheduled {
            return Err(EngineError::Conflict(format!("task is {}", task.status)));
        }
        self.scheduler.dispatch_now(id);
        Ok(())
    }

    pub async fn list_tasks(
        &self,
        limit: i64,
        offset: i64,
        status: Option<TaskStatus>,
    ) -> Result<(Vec<Task>, i64), EngineError> {
        let status = status.map(|s| s.to_string());
        let (rows, total) =
            task_repo::list_tasks(&self.pool, limit, offset, status.as_deref()).await?;
        let tasks = rows
            .into_iter()
            .map(Task::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((tasks, total))
    }

    /// Results for one task, newest first.  `NotFound` when the task
    /// itself is absent.
    pub async fn task_results(
        &self,
        id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TaskResult>, i64), EngineError> {
        task_repo::get_task(&self.pool, id).await?;
        let (rows, total) = result_repo::results_by_task(&self.pool, id, limit, offset).await?;
        Ok((rows.into_iter().map(TaskResult::from_row).collect(), total))
    }

    pub async fn list_results(
        &self,
        limit: i64,
        offset: i64,
        task_id: Option<Uuid>,
        success: Option<bool>,
    ) -> Result<(Vec<TaskResult>, i64), EngineError> {
        let (rows, total) =
            result_repo::list_results(&self.pool, limit, offset, task_id, success).await?;
        Ok((rows.into_iter().map(TaskResult::from_row).collect(), total))
    }
}

fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation("name must not be empty".into()));
    }
    Ok(())
}

fn validate_action(action: &Action) -> Result<(), EngineError> {
    let url = reqwest::Url::parse(&action.url)
        .map_err(|err| EngineError::Validation(format!("invalid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(EngineError::Validation(format!(
            "unsupported url scheme '{}'",
            url.scheme()
        )));
    }
    Ok(())
}

/// Check the trigger and compute the initial planned firing.
fn validate_trigger(
    trigger: &Trigger,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, EngineError> {
    match trigger {
        Trigger::OneOff { fire_at } => {
            if *fire_at <= now {
                return Err(EngineError::Validation("datetime must be in the future".into()));
            }
            Ok(Some(*fire_at))
        }
        Trigger::Cron { expr } => {
            let schedule = expr
                .parse::<Schedule>()
                .map_err(|err| EngineError::Validation(format!("invalid cron expression: {err}")))?;
            Ok(schedule.next_after(now))
        }
    }
}
