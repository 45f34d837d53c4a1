//! Execution result repository functions.  Results are append-only.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::TaskResultRow};

const RESULT_COLUMNS: &str = "id, task_id, run_at, status_code, success, response_headers, \
                              response_body, error_message, duration_ms, created_at";

/// Append a result row for a firing.
///
/// Returns `DbError::NotFound` when the referenced task has been deleted
/// (the foreign key cascade is authoritative).
pub async fn insert_result(pool: &PgPool, row: &TaskResultRow) -> Result<TaskResultRow, DbError> {
    let sql = format!(
        "INSERT INTO task_results ({RESULT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {RESULT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, TaskResultRow>(&sql)
        .bind(row.id)
        .bind(row.task_id)
        .bind(row.run_at)
        .bind(row.status_code)
        .bind(row.success)
        .bind(&row.response_headers)
        .bind(&row.response_body)
        .bind(&row.error_message)
        .bind(row.duration_ms)
        .bind(row.created_at)
        .fetch_one(pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => DbError::NotFound,
            _ => DbError::Sqlx(err),
        })?;

    Ok(row)
}

/// One page of results for a single task, newest firing first, plus the
/// total count for that task.
pub async fn results_by_task(
    pool: &PgPool,
    task_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<(Vec<TaskResultRow>, i64), DbError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_results WHERE task_id = $1")
        .bind(task_id)
        .fetch_one(pool)
        .await?;

    let sql = format!(
        "SELECT {RESULT_COLUMNS} FROM task_results \
         WHERE task_id = $1 \
         ORDER BY run_at DESC \
         LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, TaskResultRow>(&sql)
        .bind(task_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

/// One page across all results with optional task and success filters,
/// newest firing first, plus the total count matching the filters.
pub async fn list_results(
    pool: &PgPool,
    limit: i64,
    offset: i64,
    task_id: Option<Uuid>,
    success: Option<bool>,
) -> Result<(Vec<TaskResultRow>, i64), DbError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM task_results \
         WHERE ($1::uuid IS NULL OR task_id = $1) \
           AND ($2::boolean IS NULL OR success = $2)",
    )
    .bind(task_id)
    .bind(success)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT {RESULT_COLUMNS} FROM task_results \
         WHERE ($1::uuid IS NULL OR task_id = $1) \
           AND ($2::boolean IS NULL OR success = $2) \
         ORDER BY run_at DESC \
         LIMIT $3 OFFSET $4"
    );
    let rows = sqlx::query_as::<_, TaskResultRow>(&sql)
        .bind(task_id)
        .bind(success)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}
