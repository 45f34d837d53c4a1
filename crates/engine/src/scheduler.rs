//! The live schedule: one-off timers, the cron registry with its
//! single-flight ticker, the recovery sweep, and the dispatch pipeline.
//!
//! The in-memory maps are strictly subordinate to the store: dispatch
//! callbacks re-read the task by identity before executing, so the store
//! wins on any mismatch (cancellation, update, restart).  Locks are never
//! held across database or HTTP I/O.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Duration as TimeDelta, Timelike, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use db::models::TaskStatus;
use db::repository::{results as result_repo, tasks as task_repo};
use db::DbPool;

use crate::cron::Schedule;
use crate::executor::Execute;
use crate::metrics::Metrics;
use crate::models::{Task, Trigger};
use crate::EngineError;

/// Interval between recovery sweeps over the store.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long `stop` waits for in-flight firings: one executor timeout plus
/// the full retry budget, with slack for result persistence.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(45);

/// Handle on the live scheduling state.  Cheap to clone; all clones share
/// the same timers, registry, and worker pool.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    pool: DbPool,
    executor: Arc<dyn Execute>,
    metrics: Arc<Metrics>,
    /// Armed one-off timers by task identity.
    oneoff: RwLock<HashMap<Uuid, JoinHandle<()>>>,
    /// Armed cron entries by task identity, scanned by the ticker.
    cron: RwLock<HashMap<Uuid, Schedule>>,
    shutdown: CancellationToken,
    workers: TaskTracker,
}

impl Scheduler {
    pub fn new(pool: DbPool, executor: Arc<dyn Execute>, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                executor,
                metrics,
                oneoff: RwLock::new(HashMap::new()),
                cron: RwLock::new(HashMap::new()),
                shutdown: CancellationToken::new(),
                workers: TaskTracker::new(),
            }),
        }
    }

    /// Load every `scheduled` task from the store, arm it, and start the
    /// cron ticker and the recovery sweep.
    pub async fn start(&self) -> Result<(), EngineError> {
        info!("starting scheduler");

        let rows = task_repo::scheduled_tasks(&self.inner.pool).await?;
        let count = rows.len();
        for row in rows {
            match Task::from_row(row) {
                Ok(task) => self.arm(&task),
                Err(err) => warn!(error = %err, "skipping task row that no longer decodes"),
            }
        }

        self.spawn_cron_ticker();
        self.spawn_sweeper();

        info!(tasks = count, "scheduler started");
        Ok(())
    }

    /// Cancel all timers, quiesce dispatches, and wait for in-flight
    /// firings up to the grace window.  No new dispatches start after this
    /// begins.
    pub async fn stop(&self) {
        info!("stopping scheduler");
        self.inner.shutdown.cancel();

        let timers: Vec<JoinHandle<()>> = {
            let mut map = self.inner.oneoff.write().unwrap();
            map.drain().map(|(_, handle)| handle).collect()
        };
        for handle in timers {
            handle.abort();
        }
        self.inner.cron.write().unwrap().clear();

        self.inner.workers.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.inner.workers.wait())
            .await
            .is_err()
        {
            warn!("shutdown grace elapsed with firings still in flight");
        }
        info!("scheduler stopped");
    }

    /// Install the in-memory timer or cron entry for a task.  Tasks not in
    /// `scheduled` status are ignored.
    pub fn arm(&self, task: &Task) {
        if task.status != TaskStatus::Scheduled {
            return;
        }
        match &task.trigger {
            Trigger::OneOff { fire_at } => self.arm_oneoff(task.id, *fire_at),
            Trigger::Cron { expr } => self.arm_cron(task.id, expr),
        }
    }

    /// Drop the in-memory state for a task.  An already-fired timer is a
    /// no-op; a cron task additionally relies on the status re-read at the
    /// next tick.
    pub fn unschedule(&self, id: Uuid) {
        if let Some(handle) = self.inner.oneoff.write().unwrap().remove(&id) {
            handle.abort();
            debug!(task_id = %id, "cancelled one-off timer");
        }
        if self.inner.cron.write().unwrap().remove(&id).is_some() {
            debug!(task_id = %id, "removed cron entry");
        }
    }

    /// Dispatch a task on a fresh worker right now, bypassing its trigger.
    pub fn dispatch_now(&self, id: Uuid) {
        Inner::spawn_dispatch(&self.inner, id);
    }

    fn arm_oneoff(&self, id: Uuid, fire_at: DateTime<Utc>) {
        let delay = fire_at - Utc::now();
        if delay <= TimeDelta::zero() {
            Inner::spawn_dispatch(&self.inner, id);
            return;
        }

        let wait = delay.to_std().unwrap_or(Duration::ZERO);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = inner.shutdown.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }
            // Drop our own handle before dispatching so a cancel that
            // races the firing is a no-op.
            inner.oneoff.write().unwrap().remove(&id);
            Inner::spawn_dispatch(&inner, id);
        });

        let mut map = self.inner.oneoff.write().unwrap();
        if let Some(old) = map.insert(id, handle) {
            old.abort();
        }
        debug!(task_id = %id, fire_at = %fire_at, "armed one-off task");
    }

    fn arm_cron(&self, id: Uuid, expr: &str) {
        let schedule = match expr.parse::<Schedule>() {
            Ok(schedule) => schedule,
            Err(err) => {
                // Validated at create; a failure here means the stored row
                // was corrupted out of band.
                error!(task_id = %id, error = %err, "stored cron expression no longer parses");
                return;
            }
        };
        self.inner.cron.write().unwrap().insert(id, schedule);
        debug!(task_id = %id, expr, "armed cron task");
    }

    /// Single-flight ticker shared by all cron entries: wake at each
    /// minute boundary and dispatch every entry matching that minute.
    fn spawn_cron_ticker(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let tick = next_minute(now);
                let wait = (tick - now).to_std().unwrap_or(Duration::ZERO);
                tokio::select! {
                    _ = inner.shutdown.cancelled() => return,
                    _ = tokio::time::sleep(wait) => {}
                }

                let due: Vec<Uuid> = {
                    let registry = inner.cron.read().unwrap();
                    registry
                        .iter()
                        .filter(|(_, schedule)| schedule.matches(tick))
                        .map(|(id, _)| *id)
                        .collect()
                };

                for id in due {
                    let worker = Arc::clone(&inner);
                    inner.workers.spawn(async move {
                        worker.cron_tick(id).await;
                    });
                }
            }
        });
    }

    fn spawn_sweeper(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.shutdown.cancelled() => return,
                    _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
                }
                Inner::sweep(&inner).await;
            }
        });
    }
}

impl Inner {
    fn spawn_dispatch(inner: &Arc<Inner>, id: Uuid) {
        if inner.shutdown.is_cancelled() {
            return;
        }
        let worker = Arc::clone(inner);
        inner.workers.spawn(async move {
            worker.fire(id).await;
        });
    }

    /// One cron tick for one task: fire it, then move its planned firing
    /// forward.  A skipped firing (cancellation seen on re-read) leaves
    /// `next_run` untouched.
    async fn cron_tick(&self, id: Uuid) {
        if !self.fire(id).await {
            return;
        }

        let next = {
            let registry = self.cron.read().unwrap();
            registry.get(&id).map(|schedule| schedule.next_after(Utc::now()))
        };
        if let Some(next) = next {
            if let Err(err) = task_repo::set_next_run(&self.pool, id, next).await {
                error!(task_id = %id, error = %err, "failed to persist next run");
            }
        }
    }

    /// Re-read the task and, if it is still dispatchable, run the shared
    /// dispatch body.  Returns whether a firing happened.
    async fn fire(&self, id: Uuid) -> bool {
        let task = match task_repo::get_task(&self.pool, id).await {
            Ok(row) => match Task::from_row(row) {
                Ok(task) => task,
                Err(err) => {
                    error!(task_id = %id, error = %err, "cannot decode task row");
                    return false;
                }
            },
            Err(db::DbError::NotFound) => {
                debug!(task_id = %id, "task vanished before firing");
                return false;
            }
            Err(err) => {
                error!(task_id = %id, error = %err, "failed to re-read task");
                return false;
            }
        };

        if task.status != TaskStatus::Scheduled {
            debug!(task_id = %id, status = %task.status, "skipping firing");
            return false;
        }

        self.execute_and_record(&task).await;
        true
    }

    /// The dispatch body shared by timers, cron ticks, the sweep, and
    /// run-now: execute through the retrying executor, record metrics,
    /// persist the result, and update the task's durable bookkeeping.
    ///
    /// Persistence failures are logged and never re-trigger execution —
    /// the sweep reconciles.
    async fn execute_and_record(&self, task: &Task) {
        let started = Utc::now();
        info!(task_id = %task.id, name = %task.name, "executing task");

        let mut result = self.executor.execute(task).await;
        result.task_id = task.id;
        result.run_at = started;

        self.metrics.record(
            Duration::from_millis(result.duration_ms.max(0) as u64),
            result.success,
        );

        if let Err(err) = result_repo::insert_result(&self.pool, &result.to_row()).await {
            error!(task_id = %task.id, error = %err, "failed to persist result");
        }
        if let Err(err) = task_repo::set_last_run(&self.pool, task.id, started).await {
            error!(task_id = %task.id, error = %err, "failed to record last run");
        }

        if matches!(task.trigger, Trigger::OneOff { .. }) {
            let mut done = task.clone();
            done.status = TaskStatus::Completed;
            done.next_run = None;
            done.last_run = Some(started);
            if let Err(err) = task_repo::update_task(&self.pool, &done.to_row()).await {
                error!(task_id = %task.id, error = %err, "failed to mark task completed");
            }
        }

        info!(
            task_id = %task.id,
            success = result.success,
            status_code = ?result.status_code,
            duration_ms = result.duration_ms,
            "task execution completed",
        );
    }

    /// Recovery sweep: catch up scheduled work whose planned firing
    /// slipped into the past, e.g. across a restart.  Due one-offs are
    /// dispatched; due cron tasks only get `next_run` re-pointed — the
    /// registry fires them on the next matching tick, which avoids
    /// double-dispatch.
    async fn sweep(inner: &Arc<Inner>) {
        let now = Utc::now();
        let rows = match task_repo::due_tasks(&inner.pool, now).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "recovery sweep query failed");
                return;
            }
        };

        for row in rows {
            let task = match Task::from_row(row) {
                Ok(task) => task,
                Err(err) => {
                    warn!(error = %err, "sweep skipping task row that no longer decodes");
                    continue;
                }
            };

            match &task.trigger {
                Trigger::OneOff { .. } => {
                    if task.next_run.is_some_and(|at| at <= now) {
                        info!(task_id = %task.id, "dispatching missed one-off task");
                        Inner::spawn_dispatch(inner, task.id);
                    }
                }
                Trigger::Cron { expr } => match expr.parse::<Schedule>() {
                    Ok(schedule) => {
                        let next = schedule.next_after(now);
                        if let Err(err) = task_repo::set_next_run(&inner.pool, task.id, next).await
                        {
                            error!(task_id = %task.id, error = %err, "failed to persist next run");
                        }
                    }
                    Err(err) => {
                        warn!(task_id = %task.id, error = %err, "stored cron expression no longer parses");
                    }
                },
            }
        }
    }
}

/// The minute boundary strictly after `now`.
fn next_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    now - TimeDelta::seconds(now.second() as i64)
        - TimeDelta::nanoseconds(now.nanosecond() as i64)
        + TimeDelta::minutes(1)
}
