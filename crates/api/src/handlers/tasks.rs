//! Task endpoints: create, list, get, update, cancel, results, run-now.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use engine::models::{Headers, HttpMethod, TaskStatus};
use engine::service::{CreateTask, UpdateTask};
use engine::{EngineError, Task, TaskResult, Trigger};

use super::{resolve_page, ApiError, AppState, Pagination};

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateTaskDto {
    pub name: String,
    pub trigger: Trigger,
    pub action: ActionDto,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskDto {
    pub name: Option<String>,
    pub trigger: Option<Trigger>,
    pub action: Option<ActionDto>,
}

/// Action as it appears on the wire: the payload is JSON-typed here and
/// stored as its serialized text.
#[derive(Debug, Deserialize)]
pub struct ActionDto {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
    pub payload: Option<Value>,
}

impl ActionDto {
    fn into_action(self) -> Result<engine::models::Action, EngineError> {
        let method = self
            .method
            .parse::<HttpMethod>()
            .map_err(EngineError::Validation)?;
        let payload = match self.payload {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.to_string()),
        };
        Ok(engine::models::Action {
            method,
            url: self.url,
            headers: self.headers,
            payload,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ActionOut {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct TaskOut {
    pub id: Uuid,
    pub name: String,
    pub trigger: Trigger,
    pub action: ActionOut,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
}

impl From<Task> for TaskOut {
    fn from(task: Task) -> Self {
        // Stored payloads are serialized JSON; hand them back as values.
        let payload = task.action.payload.map(|raw| match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(_) => Value::String(raw),
        });

        Self {
            id: task.id,
            name: task.name,
            trigger: task.trigger,
            action: ActionOut {
                method: task.action.method,
                url: task.action.url,
                headers: task.action.headers,
                payload,
            },
            status: task.status,
            created_at: task.created_at,
            updated_at: task.updated_at,
            next_run: task.next_run,
            last_run: task.last_run,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultOut {
    pub id: Uuid,
    pub task_id: Uuid,
    pub run_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i32>,
    pub success: bool,
    pub response_headers: Headers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl From<TaskResult> for ResultOut {
    fn from(result: TaskResult) -> Self {
        Self {
            id: result.id,
            task_id: result.task_id,
            run_at: result.run_at,
            status_code: result.status_code,
            success: result.success,
            response_headers: result.response_headers,
            response_body: result.response_body,
            error_message: result.error_message,
            duration_ms: result.duration_ms,
            created_at: result.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct TaskListOut {
    pub tasks: Vec<TaskOut>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct ResultListOut {
    pub results: Vec<ResultOut>,
    pub pagination: Pagination,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskDto>,
) -> Result<(StatusCode, Json<TaskOut>), ApiError> {
    let action = payload.action.into_action()?;
    let task = state
        .service
        .create_task(CreateTask {
            name: payload.name,
            trigger: payload.trigger,
            action,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(task.into())))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<TaskListOut>, ApiError> {
    let (page, limit, offset) = resolve_page(query.page, query.limit);
    let (tasks, total) = state.service.list_tasks(limit, offset, query.status).await?;

    Ok(Json(TaskListOut {
        tasks: tasks.into_iter().map(TaskOut::from).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<TaskOut>, ApiError> {
    let task = state.service.get_task(id).await?;
    Ok(Json(task.into()))
}

pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateTaskDto>,
) -> Result<Json<TaskOut>, ApiError> {
    let action = payload.action.map(ActionDto::into_action).transpose()?;
    let task = state
        .service
        .update_task(
            id,
            UpdateTask {
                name: payload.name,
                trigger: payload.trigger,
                action,
            },
        )
        .await?;

    Ok(Json(task.into()))
}

pub async fn cancel(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    state.service.cancel_task(id).await?;
    Ok(Json(json!({ "message": "task cancelled" })))
}

pub async fn results(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ResultListOut>, ApiError> {
    let (page, limit, offset) = resolve_page(query.page, query.limit);
    let (results, total) = state.service.task_results(id, limit, offset).await?;

    Ok(Json(ResultListOut {
        results: results.into_iter().map(ResultOut::from).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

pub async fn execute(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.service.run_now(id).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "message": "task dispatched" }))))
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn action_dto(method: &str, payload: Option<Value>) -> ActionDto {
        ActionDto {
            method: method.into(),
            url: "https://example.com/hook".into(),
            headers: Headers::new(),
            payload,
        }
    }

    #[test]
    fn unknown_method_is_a_validation_error() {
        let err = action_dto("TRACE", None).into_action().unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn method_parsing_accepts_lowercase() {
        let action = action_dto("post", None).into_action().unwrap();
        assert_eq!(action.method, HttpMethod::Post);
    }

    #[test]
    fn json_payload_is_stored_as_its_serialized_text() {
        let action = action_dto("POST", Some(json!({ "a": 1 }))).into_action().unwrap();
        assert_eq!(action.payload.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn null_payload_means_no_body() {
        let action = action_dto("POST", Some(Value::Null)).into_action().unwrap();
        assert!(action.payload.is_none());
    }

    #[test]
    fn stored_payload_round_trips_as_a_json_value() {
        let dto = action_dto("POST", Some(json!({ "a": [1, 2], "b": "x" })));
        let action = dto.into_action().unwrap();

        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let task = Task {
            id: Uuid::new_v4(),
            name: "ping".into(),
            trigger: Trigger::OneOff { fire_at: now },
            action,
            status: TaskStatus::Scheduled,
            created_at: now,
            updated_at: now,
            next_run: None,
            last_run: None,
        };

        let out = TaskOut::from(task);
        assert_eq!(out.action.payload, Some(json!({ "a": [1, 2], "b": "x" })));
    }

    #[test]
    fn create_dto_parses_the_documented_wire_shape() {
        let dto: CreateTaskDto = serde_json::from_value(json!({
            "name": "ping",
            "trigger": { "type": "one-off", "datetime": "2030-01-01T00:00:00Z" },
            "action": { "method": "GET", "url": "http://mock/ok" }
        }))
        .unwrap();

        assert_eq!(dto.name, "ping");
        assert!(matches!(dto.trigger, Trigger::OneOff { .. }));
        assert!(dto.action.headers.is_empty());
        assert!(dto.action.payload.is_none());
    }

    #[test]
    fn task_out_omits_absent_optional_fields() {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            name: "ping".into(),
            trigger: Trigger::Cron { expr: "* * * * *".into() },
            action: action_dto("GET", None).into_action().unwrap(),
            status: TaskStatus::Scheduled,
            created_at: now,
            updated_at: now,
            next_run: None,
            last_run: None,
        };

        let value = serde_json::to_value(TaskOut::from(task)).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("next_run"));
        assert!(!object.contains_key("last_run"));
        assert_eq!(value["status"], json!("scheduled"));
        assert_eq!(value["trigger"], json!({ "type": "cron", "cron": "* * * * *" }));
    }
}
