//! Task CRUD operations and the scheduler's recovery queries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::TaskRow};

const TASK_COLUMNS: &str = "id, name, trigger_type, trigger_time, cron_expr, method, url, \
                            headers, payload, status, created_at, updated_at, next_run, last_run";

/// Map constraint violations onto typed errors.  A duplicate primary key is
/// a `Conflict`; everything else passes through as `Sqlx`.
fn insert_error(err: sqlx::Error) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Conflict("a task with this id already exists".into())
        }
        _ => DbError::Sqlx(err),
    }
}

/// Insert a new task.
pub async fn insert_task(pool: &PgPool, row: &TaskRow) -> Result<TaskRow, DbError> {
    let sql = format!(
        "INSERT INTO tasks ({TASK_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING {TASK_COLUMNS}"
    );
    let row = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(row.id)
        .bind(&row.name)
        .bind(&row.trigger_type)
        .bind(row.trigger_time)
        .bind(&row.cron_expr)
        .bind(&row.method)
        .bind(&row.url)
        .bind(&row.headers)
        .bind(&row.payload)
        .bind(&row.status)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.next_run)
        .bind(row.last_run)
        .fetch_one(pool)
        .await
        .map_err(insert_error)?;

    Ok(row)
}

/// Fetch a single task by its primary key.
pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<TaskRow, DbError> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
    let row = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Whole-record write.  Sets `updated_at`; `created_at` is never touched.
///
/// Returns `DbError::NotFound` if no row was updated.
pub async fn update_task(pool: &PgPool, row: &TaskRow) -> Result<TaskRow, DbError> {
    let sql = format!(
        "UPDATE tasks SET \
             name = $2, trigger_type = $3, trigger_time = $4, cron_expr = $5, \
             method = $6, url = $7, headers = $8, payload = $9, status = $10, \
             updated_at = $11, next_run = $12, last_run = $13 \
         WHERE id = $1 \
         RETURNING {TASK_COLUMNS}"
    );
    let row = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(row.id)
        .bind(&row.name)
        .bind(&row.trigger_type)
        .bind(row.trigger_time)
        .bind(&row.cron_expr)
        .bind(&row.method)
        .bind(&row.url)
        .bind(&row.headers)
        .bind(&row.payload)
        .bind(&row.status)
        .bind(Utc::now())
        .bind(row.next_run)
        .bind(row.last_run)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Transition a task to `cancelled`.  Terminal; the caller decides whether
/// re-cancelling is a no-op or a conflict.
///
/// Returns `DbError::NotFound` if the task does not exist.
pub async fn mark_cancelled(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE tasks SET status = 'cancelled', updated_at = $2 WHERE id = $1",
    )
    .bind(id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Return one page of tasks ordered by creation time (newest first), plus
/// the total count matching the optional status filter.
pub async fn list_tasks(
    pool: &PgPool,
    limit: i64,
    offset: i64,
    status: Option<&str>,
) -> Result<(Vec<TaskRow>, i64), DbError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tasks WHERE ($1::text IS NULL OR status = $1)",
    )
    .bind(status)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks \
         WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY created_at DESC \
         LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

/// All tasks in `scheduled` status, used by the scheduler to arm the live
/// schedule on startup.
pub async fn scheduled_tasks(pool: &PgPool) -> Result<Vec<TaskRow>, DbError> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'scheduled'");
    let rows = sqlx::query_as::<_, TaskRow>(&sql).fetch_all(pool).await?;

    Ok(rows)
}

/// Scheduled tasks whose planned firing has slipped into the past (or was
/// never planned).  Feeds the recovery sweep.
pub async fn due_tasks(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<TaskRow>, DbError> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks \
         WHERE status = 'scheduled' AND (next_run IS NULL OR next_run <= $1)"
    );
    let rows = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(now)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Update the planned firing instant.  `None` clears it.
pub async fn set_next_run(
    pool: &PgPool,
    id: Uuid,
    next_run: Option<DateTime<Utc>>,
) -> Result<(), DbError> {
    sqlx::query("UPDATE tasks SET next_run = $2 WHERE id = $1")
        .bind(id)
        .bind(next_run)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record the instant of the most recent completed firing.
pub async fn set_last_run(pool: &PgPool, id: Uuid, last_run: DateTime<Utc>) -> Result<(), DbError> {
    sqlx::query("UPDATE tasks SET last_run = $2 WHERE id = $1")
        .bind(id)
        .bind(last_run)
        .execute(pool)
        .await?;

    Ok(())
}
