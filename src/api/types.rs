//! API request and response types.
//!
//! Shared by the server handlers and the client transport, so both ends agree
//! on field names (`camelCase` on the wire).

use serde::{Deserialize, Serialize};

use crate::board::{position, ColumnMap, PageInfo, PendingUpdate, Task};

/// Query for `GET /api/task`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksQuery {
    /// 1-based page number; anything unparsable means page 1
    pub page: Option<String>,

    /// Restrict to one column; omitted means every column
    pub column: Option<String>,
}

/// One page of tasks, per column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksResponse {
    #[serde(default)]
    pub message: String,

    pub tasks: ColumnMap<Vec<Task>>,

    pub pagination: ColumnMap<PageInfo>,
}

/// Request to create a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Column key (defaults to "backlog")
    #[serde(default)]
    pub column: Option<String>,
}

/// Request to update one task.
///
/// `position` here is a target index, not a key: the server resolves it
/// against the column's current ordering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub task_id: Option<String>,

    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub column: Option<String>,

    /// Any JSON number; the service rejects fractional values
    #[serde(default)]
    pub position: Option<serde_json::Number>,
}

/// Query for `DELETE /api/task`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTaskQuery {
    pub task_id: Option<String>,
}

/// Single-task response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub message: String,

    pub task: Task,
}

/// Request body for `PATCH /api/task/batch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchUpdateRequest {
    #[serde(default)]
    pub updates: Vec<BatchUpdateItem>,
}

/// One coalesced update inside a batch.
///
/// Fields are loose on purpose: structural checks happen in the batch
/// handler so every bad item can be reported at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateItem {
    #[serde(default)]
    pub task_id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub column: Option<String>,

    /// Position key, trusted as sent (plain or boxed decimal)
    #[serde(default, deserialize_with = "position::deserialize_optional")]
    pub position: Option<f64>,
}

impl From<PendingUpdate> for BatchUpdateItem {
    fn from(update: PendingUpdate) -> Self {
        Self {
            task_id: Some(update.task_id.to_string()),
            title: Some(update.title),
            description: Some(update.description),
            column: Some(update.column.as_str().to_string()),
            position: Some(update.position),
        }
    }
}

/// Item that failed to persist inside an otherwise accepted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpdate {
    pub task_id: String,

    pub error: String,
}

/// Outcome of an accepted batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    #[serde(default)]
    pub message: String,

    pub updated: Vec<Task>,

    pub failed: Vec<FailedUpdate>,

    pub success_count: usize,

    pub failure_count: usize,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,

    /// Per-item validation failures, when there are several
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status ("ok" or "degraded")
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether unauthenticated requests are attributed to the dev user
    pub dev_mode: bool,

    pub database: DatabaseHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub persistent: bool,

    pub reachable: bool,
}
