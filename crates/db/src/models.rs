//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// tasks
// ---------------------------------------------------------------------------

/// Possible statuses for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other       => Err(format!("unknown task status: {other}")),
        }
    }
}

/// How a task is triggered, as stored in the `trigger_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    #[serde(rename = "one-off")]
    OneOff,
    #[serde(rename = "cron")]
    Cron,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneOff => write!(f, "one-off"),
            Self::Cron   => write!(f, "cron"),
        }
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one-off" => Ok(Self::OneOff),
            "cron"    => Ok(Self::Cron),
            other     => Err(format!("unknown trigger type: {other}")),
        }
    }
}

/// A persisted task row.
///
/// The trigger is flattened into `trigger_type` plus one of the two
/// companion columns (`trigger_time` for one-off, `cron_expr` for cron).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub name: String,
    pub trigger_type: String,
    pub trigger_time: Option<DateTime<Utc>>,
    pub cron_expr: Option<String>,
    pub method: String,
    pub url: String,
    /// JSON object mapping header names to values.
    pub headers: serde_json::Value,
    /// Serialized JSON request body, if any.
    pub payload: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// task_results
// ---------------------------------------------------------------------------

/// A persisted execution result row.  Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskResultRow {
    pub id: Uuid,
    pub task_id: Uuid,
    pub run_at: DateTime<Utc>,
    pub status_code: Option<i32>,
    pub success: bool,
    /// JSON object with the first value seen for each response header.
    pub response_headers: serde_json::Value,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}
