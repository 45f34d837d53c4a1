//! Core domain models for the task scheduler.
//!
//! These types are the source of truth for what a task looks like in
//! memory.  The `db` crate stores them flattened (the trigger becomes a
//! `trigger_type` discriminator plus one companion column); conversions in
//! both directions live here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use db::models::{TaskResultRow, TaskRow, TriggerType};
use crate::EngineError;

pub use db::models::TaskStatus;

/// Header name → value mapping.  Order is not preserved.
pub type Headers = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// When a task fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Trigger {
    /// Fires once, at an absolute instant.
    #[serde(rename = "one-off")]
    OneOff {
        #[serde(rename = "datetime")]
        fire_at: DateTime<Utc>,
    },
    /// Fires on a recurring five-field cron schedule.
    #[serde(rename = "cron")]
    Cron {
        #[serde(rename = "cron")]
        expr: String,
    },
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// HTTP methods a task may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get     => write!(f, "GET"),
            Self::Post    => write!(f, "POST"),
            Self::Put     => write!(f, "PUT"),
            Self::Delete  => write!(f, "DELETE"),
            Self::Patch   => write!(f, "PATCH"),
            Self::Head    => write!(f, "HEAD"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET"     => Ok(Self::Get),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "DELETE"  => Ok(Self::Delete),
            "PATCH"   => Ok(Self::Patch),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other     => Err(format!("unsupported http method: {other}")),
        }
    }
}

/// The outbound HTTP request a firing performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub method: HttpMethod,
    /// Absolute http(s) URL.
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
    /// Serialized JSON request body, if any.
    pub payload: Option<String>,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A scheduled unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub trigger: Trigger,
    pub action: Action,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Instant of the next planned firing, if any.
    pub next_run: Option<DateTime<Utc>>,
    /// Instant of the most recent completed firing, if any.
    pub last_run: Option<DateTime<Utc>>,
}

impl Task {
    /// Decode a persisted row into the domain type.
    ///
    /// # Errors
    /// [`EngineError::Internal`] when the row no longer decodes (unknown
    /// status or method, or a trigger missing its companion column).
    pub fn from_row(row: TaskRow) -> Result<Self, EngineError> {
        let trigger = match row.trigger_type.parse::<TriggerType>() {
            Ok(TriggerType::OneOff) => Trigger::OneOff {
                fire_at: row.trigger_time.ok_or_else(|| {
                    EngineError::Internal(format!("one-off task {} has no trigger time", row.id))
                })?,
            },
            Ok(TriggerType::Cron) => Trigger::Cron {
                expr: row.cron_expr.ok_or_else(|| {
                    EngineError::Internal(format!("cron task {} has no expression", row.id))
                })?,
            },
            Err(err) => return Err(EngineError::Internal(err)),
        };

        Ok(Self {
            id: row.id,
            name: row.name,
            trigger,
            action: Action {
                method: row.method.parse().map_err(EngineError::Internal)?,
                url: row.url,
                // Tolerate malformed header JSON rather than losing the task.
                headers: serde_json::from_value(row.headers).unwrap_or_default(),
                payload: row.payload,
            },
            status: row.status.parse().map_err(EngineError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            next_run: row.next_run,
            last_run: row.last_run,
        })
    }

    /// Flatten into the persisted representation.
    pub fn to_row(&self) -> TaskRow {
        let (trigger_type, trigger_time, cron_expr) = match &self.trigger {
            Trigger::OneOff { fire_at } => (TriggerType::OneOff, Some(*fire_at), None),
            Trigger::Cron { expr } => (TriggerType::Cron, None, Some(expr.clone())),
        };

        TaskRow {
            id: self.id,
            name: self.name.clone(),
            trigger_type: trigger_type.to_string(),
            trigger_time,
            cron_expr,
            method: self.action.method.to_string(),
            url: self.action.url.clone(),
            headers: serde_json::to_value(&self.action.headers)
                .unwrap_or_else(|_| serde_json::json!({})),
            payload: self.action.payload.clone(),
            status: self.status.to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            next_run: self.next_run,
            last_run: self.last_run,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskResult
// ---------------------------------------------------------------------------

/// The immutable record of one firing attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: Uuid,
    pub task_id: Uuid,
    /// Instant the attempt started.
    pub run_at: DateTime<Utc>,
    /// HTTP status of the final attempt, absent on transport failure.
    pub status_code: Option<i32>,
    /// True iff the status was 2xx and no transport error occurred.
    pub success: bool,
    /// First value seen for each response header.
    pub response_headers: Headers,
    /// Response body, capped at the storage limit.
    pub response_body: Option<String>,
    /// Present iff `success` is false.
    pub error_message: Option<String>,
    /// Wall time from attempt start to result finalization.
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn from_row(row: TaskResultRow) -> Self {
        Self {
            id: row.id,
            task_id: row.task_id,
            run_at: row.run_at,
            status_code: row.status_code,
            success: row.success,
            response_headers: serde_json::from_value(row.response_headers).unwrap_or_default(),
            response_body: row.response_body,
            error_message: row.error_message,
            duration_ms: row.duration_ms,
            created_at: row.created_at,
        }
    }

    pub fn to_row(&self) -> TaskResultRow {
        TaskResultRow {
            id: self.id,
            task_id: self.task_id,
            run_at: self.run_at,
            status_code: self.status_code,
            success: self.success,
            response_headers: serde_json::to_value(&self.response_headers)
                .unwrap_or_else(|_| serde_json::json!({})),
            response_body: self.response_body.clone(),
            error_message: self.error_message.clone(),
            duration_ms: self.duration_ms,
            created_at: self.created_at,
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_task(trigger: Trigger) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            name: "ping".into(),
            trigger,
            action: Action {
                method: HttpMethod::Post,
                url: "https://example.com/hook".into(),
                headers: Headers::from([("X-Token".to_string(), "abc".to_string())]),
                payload: Some(r#"{"ok":true}"#.into()),
            },
            status: TaskStatus::Scheduled,
            created_at: now,
            updated_at: now,
            next_run: Some(now),
            last_run: None,
        }
    }

    #[test]
    fn one_off_trigger_wire_format() {
        let trigger = Trigger::OneOff {
            fire_at: "2025-06-01T12:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&trigger).unwrap();
        assert_eq!(
            value,
            json!({ "type": "one-off", "datetime": "2025-06-01T12:00:00Z" })
        );

        let parsed: Trigger = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, trigger);
    }

    #[test]
    fn cron_trigger_wire_format() {
        let trigger = Trigger::Cron { expr: "*/5 * * * *".into() };
        let value = serde_json::to_value(&trigger).unwrap();
        assert_eq!(value, json!({ "type": "cron", "cron": "*/5 * * * *" }));
    }

    #[test]
    fn unknown_trigger_type_is_rejected() {
        let result: Result<Trigger, _> =
            serde_json::from_value(json!({ "type": "webhook", "path": "/x" }));
        assert!(result.is_err());
    }

    #[test]
    fn status_wire_values_are_exact() {
        assert_eq!(serde_json::to_value(TaskStatus::Scheduled).unwrap(), json!("scheduled"));
        assert_eq!(serde_json::to_value(TaskStatus::Cancelled).unwrap(), json!("cancelled"));
        assert_eq!(serde_json::to_value(TaskStatus::Completed).unwrap(), json!("completed"));
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert!("paused".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn one_off_task_row_round_trip() {
        let task = sample_task(Trigger::OneOff { fire_at: Utc::now() });
        let row = task.to_row();
        assert_eq!(row.trigger_type, "one-off");
        assert!(row.trigger_time.is_some());
        assert!(row.cron_expr.is_none());

        let back = Task::from_row(row).unwrap();
        assert_eq!(back.trigger, task.trigger);
        assert_eq!(back.action, task.action);
        assert_eq!(back.status, task.status);
    }

    #[test]
    fn cron_task_row_round_trip() {
        let task = sample_task(Trigger::Cron { expr: "0 9 * * 1-5".into() });
        let row = task.to_row();
        assert_eq!(row.trigger_type, "cron");
        assert_eq!(row.cron_expr.as_deref(), Some("0 9 * * 1-5"));
        assert!(row.trigger_time.is_none());

        let back = Task::from_row(row).unwrap();
        assert_eq!(back.trigger, task.trigger);
    }

    #[test]
    fn row_missing_companion_column_is_internal_error() {
        let mut row = sample_task(Trigger::OneOff { fire_at: Utc::now() }).to_row();
        row.trigger_time = None;
        assert!(matches!(Task::from_row(row), Err(EngineError::Internal(_))));
    }

    #[test]
    fn header_mapping_survives_the_round_trip() {
        let mut task = sample_task(Trigger::OneOff { fire_at: Utc::now() });
        task.action.headers = Headers::from([
            ("Authorization".to_string(), "Bearer t".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ]);
        let back = Task::from_row(task.to_row()).unwrap();
        assert_eq!(back.action.headers, task.action.headers);
    }
}
