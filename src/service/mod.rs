//! Server-side task operations.
//!
//! HTTP handlers stay thin: they authenticate, extract, and call into
//! [`TaskService`]. All ownership checks and ordering decisions live here.

mod batch;
mod resolver;

pub use resolver::resolve_position;

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;

use crate::api::types::{CreateTaskRequest, TasksQuery, TasksResponse, UpdateTaskRequest};
use crate::board::{
    normalize_description, normalize_title, Column, FieldError, OwnerId, PageInfo, Task, TaskId,
};
use crate::store::{SharedTaskStore, StoreError};

/// Errors surfaced to API callers.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<String>,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors: Vec::new(),
        }
    }
}

impl From<FieldError> for ServiceError {
    fn from(err: FieldError) -> Self {
        Self::validation(err.to_string())
    }
}

/// Task operations bound to one store.
#[derive(Clone)]
pub struct TaskService {
    store: SharedTaskStore,
    page_size: usize,
}

impl TaskService {
    pub fn new(store: SharedTaskStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub fn store(&self) -> &SharedTaskStore {
        &self.store
    }

    /// One page of one column, or the same page of every column.
    pub async fn list(
        &self,
        owner: &OwnerId,
        query: &TasksQuery,
    ) -> Result<TasksResponse, ServiceError> {
        let page = parse_page(query.page.as_deref());
        let columns = match query.column.as_deref() {
            Some(key) => vec![parse_column(key)?],
            None => Column::ALL.to_vec(),
        };

        let skip = (page as usize - 1).saturating_mul(self.page_size);
        let mut tasks = BTreeMap::new();
        let mut pagination = BTreeMap::new();
        for column in columns {
            let total = self.store.count_in_column(owner, column).await?;
            let page_tasks = self
                .store
                .page_in_column(owner, column, skip, self.page_size)
                .await?;
            tasks.insert(column, page_tasks);
            pagination.insert(
                column,
                PageInfo::for_page(page, self.page_size as u32, total),
            );
        }

        Ok(TasksResponse {
            message: "Tasks retrieved successfully".to_string(),
            tasks,
            pagination,
        })
    }

    /// Create a task at the end of its column.
    pub async fn create(
        &self,
        owner: &OwnerId,
        req: CreateTaskRequest,
    ) -> Result<Task, ServiceError> {
        let title = normalize_title(req.title.as_deref().unwrap_or(""))?;
        let description = normalize_description(req.description.as_deref())?;
        let column = match req.column.as_deref() {
            Some(key) if !key.is_empty() => parse_column(key)?,
            _ => Column::default(),
        };

        let position = self
            .store
            .max_position(owner, column)
            .await?
            .map(|max| max + 1.0)
            .unwrap_or(0.0);

        let task = Task::new(owner.clone(), title, description, column, position);
        self.store.insert(&task).await?;
        tracing::debug!(task_id = %task.id, %column, position, "Created task");
        Ok(task)
    }

    /// Update one task, resolving a target index to a position key against
    /// the column's current server-side ordering.
    pub async fn update(
        &self,
        owner: &OwnerId,
        req: UpdateTaskRequest,
    ) -> Result<Task, ServiceError> {
        let raw_id = req
            .task_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ServiceError::validation("Task ID is required"))?;
        let title = normalize_title(req.title.as_deref().unwrap_or(""))?;
        let description = normalize_description(req.description.as_deref())?;
        let column = req
            .column
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(parse_column)
            .transpose()?;
        let index = req.position.as_ref().map(target_index).transpose()?;

        let mut task = self.owned_task(owner, raw_id, "update").await?;
        task.title = title;
        task.description = description;
        if let Some(column) = column {
            task.column = column;
        }
        if let Some(index) = index {
            task.position =
                resolve_position(self.store.as_ref(), owner, task.column, task.id, index).await?;
        }
        task.updated_at = Utc::now();

        self.store.save(&task).await?;
        Ok(task)
    }

    /// Delete one task owned by `owner`.
    pub async fn delete(&self, owner: &OwnerId, task_id: Option<&str>) -> Result<(), ServiceError> {
        let raw_id = task_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ServiceError::validation("Task ID is required"))?;
        let task = self.owned_task(owner, raw_id, "delete").await?;
        if !self.store.delete(task.id).await? {
            return Err(ServiceError::NotFound("Task not found".to_string()));
        }
        tracing::debug!(task_id = %task.id, "Deleted task");
        Ok(())
    }

    /// Look up a task and verify `owner` holds it.
    async fn owned_task(
        &self,
        owner: &OwnerId,
        raw_id: &str,
        action: &str,
    ) -> Result<Task, ServiceError> {
        let not_found = || ServiceError::NotFound("Task not found".to_string());
        let id = TaskId::from_str(raw_id).map_err(|_| not_found())?;
        let task = self.store.get(id).await?.ok_or_else(not_found)?;
        if &task.owner_id != owner {
            return Err(ServiceError::Forbidden(format!(
                "Unauthorized to {action} this task"
            )));
        }
        Ok(task)
    }
}

/// Page numbers are 1-based; junk and values below 1 mean page 1.
fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .map(|p| p.clamp(1, i64::from(u32::MAX)) as u32)
        .unwrap_or(1)
}

/// A target index from the wire. Negative means the front; fractions are
/// rejected.
fn target_index(raw: &serde_json::Number) -> Result<usize, ServiceError> {
    if let Some(index) = raw.as_u64() {
        return Ok(usize::try_from(index).unwrap_or(usize::MAX));
    }
    if raw.is_i64() {
        return Ok(0);
    }
    match raw.as_f64() {
        Some(value) if value.is_finite() && value.fract() == 0.0 => Ok(value.max(0.0) as usize),
        _ => Err(ServiceError::validation("Position must be a whole number index")),
    }
}

fn parse_column(key: &str) -> Result<Column, ServiceError> {
    Column::from_str(key).map_err(|_| ServiceError::validation("Invalid column name"))
}
