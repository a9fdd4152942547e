//! Batch application of coalesced client updates.
//!
//! The batch is checked in two phases before anything is written:
//! 1. Structure: every item names a task and any column is a known one.
//! 2. Existence and ownership: every referenced task exists and belongs to
//!    the caller (one query for all of them).
//!
//! A failure in either phase rejects the whole batch with zero writes. After
//! that, items are written one by one and a failing item is reported without
//! stopping its siblings. Positions are written exactly as sent; they were
//! computed by the same allocator the server uses.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;

use super::{ServiceError, TaskService};
use crate::api::types::{BatchUpdateItem, BatchUpdateRequest, BatchUpdateResponse, FailedUpdate};
use crate::board::{Column, OwnerId, Task, TaskId};

impl TaskService {
    /// Apply a list of coalesced updates for `owner`.
    pub async fn apply_batch(
        &self,
        owner: &OwnerId,
        req: BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, ServiceError> {
        let updates = req.updates;
        if updates.is_empty() {
            return Err(ServiceError::validation(
                "Updates must be a non-empty array",
            ));
        }

        let errors = structural_errors(&updates);
        if !errors.is_empty() {
            tracing::warn!(
                owner = %owner,
                errors = errors.len(),
                "Rejecting batch: validation failed"
            );
            return Err(ServiceError::Validation {
                message: "Validation failed".to_string(),
                errors,
            });
        }

        let not_found = || ServiceError::NotFound("Some tasks not found or unauthorized".to_string());

        // Every id must parse; an unparsable id cannot name an existing task.
        let ids = updates
            .iter()
            .map(|u| {
                u.task_id
                    .as_deref()
                    .and_then(|raw| TaskId::from_str(raw).ok())
                    .ok_or_else(not_found)
            })
            .collect::<Result<Vec<TaskId>, _>>()?;

        let mut distinct = ids.clone();
        distinct.sort();
        distinct.dedup();

        let owned = self.store.find_owned(owner, &distinct).await?;
        if owned.len() != distinct.len() {
            tracing::warn!(
                owner = %owner,
                requested = distinct.len(),
                found = owned.len(),
                "Rejecting batch: tasks missing or not owned"
            );
            return Err(not_found());
        }

        let mut tasks: HashMap<TaskId, Task> = owned.into_iter().map(|t| (t.id, t)).collect();
        let mut updated = Vec::with_capacity(updates.len());
        let mut failed = Vec::new();

        for (id, update) in ids.into_iter().zip(&updates) {
            let Some(task) = tasks.get_mut(&id) else {
                continue;
            };
            apply_fields(task, update);
            match self.store.save(task).await {
                Ok(()) => updated.push(task.clone()),
                Err(e) => {
                    tracing::warn!(task_id = %id, "Batch item failed: {}", e);
                    failed.push(FailedUpdate {
                        task_id: id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            owner = %owner,
            succeeded = updated.len(),
            failed = failed.len(),
            "Batch update applied"
        );

        Ok(BatchUpdateResponse {
            message: "Batch update completed".to_string(),
            success_count: updated.len(),
            failure_count: failed.len(),
            updated,
            failed,
        })
    }
}

/// Per-item structural problems, labelled by index.
fn structural_errors(updates: &[BatchUpdateItem]) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, update) in updates.iter().enumerate() {
        if update
            .task_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty())
        {
            errors.push(format!("Update {i}: taskId is required"));
        }
        if let Some(column) = update.column.as_deref().filter(|c| !c.is_empty()) {
            if Column::from_str(column).is_err() {
                errors.push(format!("Update {i}: invalid column name"));
            }
        }
        if update.position.is_some_and(|p| !p.is_finite()) {
            errors.push(format!("Update {i}: position must be a finite number"));
        }
    }
    errors
}

/// Copy supplied fields onto `task`. A blank title leaves the old one.
fn apply_fields(task: &mut Task, update: &BatchUpdateItem) {
    if let Some(title) = update.title.as_deref().map(str::trim) {
        if !title.is_empty() {
            task.title = title.to_string();
        }
    }
    if let Some(description) = update.description.as_deref() {
        task.description = description.trim().to_string();
    }
    if let Some(column) = update
        .column
        .as_deref()
        .and_then(|c| Column::from_str(c).ok())
    {
        task.column = column;
    }
    if let Some(position) = update.position {
        task.position = position;
    }
    task.updated_at = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryTaskStore, StoreError, TaskStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    async fn seeded(owner: &OwnerId, count: usize) -> (TaskService, Vec<Task>) {
        let store = Arc::new(InMemoryTaskStore::new());
        let mut tasks = Vec::new();
        for n in 0..count {
            let task = Task::new(
                owner.clone(),
                format!("task {n}"),
                String::new(),
                Column::Backlog,
                n as f64 * 10.0,
            );
            store.insert(&task).await.unwrap();
            tasks.push(task);
        }
        (TaskService::new(store, 10), tasks)
    }

    fn item(task: &Task, column: &str, position: f64) -> BatchUpdateItem {
        BatchUpdateItem {
            task_id: Some(task.id.to_string()),
            title: Some(task.title.clone()),
            description: Some(task.description.clone()),
            column: Some(column.to_string()),
            position: Some(position),
        }
    }

    #[tokio::test]
    async fn applies_client_positions_verbatim() {
        let owner = OwnerId::new("alice");
        let (svc, tasks) = seeded(&owner, 2).await;

        let result = svc
            .apply_batch(
                &owner,
                BatchUpdateRequest {
                    updates: vec![item(&tasks[0], "done", 12.345), item(&tasks[1], "todo", 0.125)],
                },
            )
            .await
            .unwrap();

        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 0);
        let stored = svc.store().get(tasks[0].id).await.unwrap().unwrap();
        assert_eq!(stored.column, Column::Done);
        assert_eq!(stored.position, 12.345);
        let stored = svc.store().get(tasks[1].id).await.unwrap().unwrap();
        assert_eq!(stored.column, Column::Todo);
        assert_eq!(stored.position, 0.125);
    }

    #[tokio::test]
    async fn missing_task_rejects_whole_batch_without_writes() {
        let owner = OwnerId::new("alice");
        let (svc, tasks) = seeded(&owner, 5).await;

        let mut updates: Vec<BatchUpdateItem> =
            tasks.iter().map(|t| item(t, "done", 99.0)).collect();
        updates[2].task_id = Some(TaskId::new().to_string());

        let err = svc
            .apply_batch(&owner, BatchUpdateRequest { updates })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        for task in &tasks {
            let stored = svc.store().get(task.id).await.unwrap().unwrap();
            assert_eq!(stored.column, Column::Backlog);
            assert_eq!(stored.position, task.position);
        }
    }

    #[tokio::test]
    async fn foreign_task_rejects_whole_batch() {
        let owner = OwnerId::new("alice");
        let (svc, tasks) = seeded(&owner, 2).await;

        let err = svc
            .apply_batch(
                &OwnerId::new("mallory"),
                BatchUpdateRequest {
                    updates: vec![item(&tasks[0], "done", 1.0)],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let stored = svc.store().get(tasks[0].id).await.unwrap().unwrap();
        assert_eq!(stored.column, Column::Backlog);
    }

    #[tokio::test]
    async fn structural_errors_are_all_reported() {
        let owner = OwnerId::new("alice");
        let (svc, tasks) = seeded(&owner, 1).await;

        let mut bad_column = item(&tasks[0], "archive", 1.0);
        bad_column.title = None;
        let no_id = BatchUpdateItem {
            column: Some("todo".into()),
            ..Default::default()
        };

        let err = svc
            .apply_batch(
                &owner,
                BatchUpdateRequest {
                    updates: vec![bad_column, no_id],
                },
            )
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation { message, errors } => {
                assert_eq!(message, "Validation failed");
                assert_eq!(
                    errors,
                    vec![
                        "Update 0: invalid column name".to_string(),
                        "Update 1: taskId is required".to_string(),
                    ]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let err = svc
            .apply_batch(&owner, BatchUpdateRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Updates must be a non-empty array");
    }

    #[tokio::test]
    async fn blank_title_keeps_existing_and_description_is_trimmed() {
        let owner = OwnerId::new("alice");
        let (svc, tasks) = seeded(&owner, 1).await;
        let mut update = item(&tasks[0], "todo", 3.0);
        update.title = Some("   ".into());
        update.description = Some("  fresh notes ".into());

        let result = svc
            .apply_batch(&owner, BatchUpdateRequest { updates: vec![update] })
            .await
            .unwrap();
        assert_eq!(result.updated[0].title, "task 0");
        assert_eq!(result.updated[0].description, "fresh notes");
    }

    #[tokio::test]
    async fn repeated_task_id_is_applied_in_order() {
        let owner = OwnerId::new("alice");
        let (svc, tasks) = seeded(&owner, 1).await;

        let result = svc
            .apply_batch(
                &owner,
                BatchUpdateRequest {
                    updates: vec![item(&tasks[0], "todo", 4.0), item(&tasks[0], "done", 8.0)],
                },
            )
            .await
            .unwrap();
        assert_eq!(result.success_count, 2);
        assert!(result.failed.is_empty());

        let stored = svc.store().get(tasks[0].id).await.unwrap().unwrap();
        assert_eq!(stored.column, Column::Done);
        assert_eq!(stored.position, 8.0);
    }

    /// Store whose writes fail for one chosen task.
    struct FlakyStore {
        inner: InMemoryTaskStore,
        poisoned: TaskId,
    }

    #[async_trait]
    impl TaskStore for FlakyStore {
        fn is_persistent(&self) -> bool {
            false
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
            self.inner.get(id).await
        }
        async fn find_owned(
            &self,
            owner: &OwnerId,
            ids: &[TaskId],
        ) -> Result<Vec<Task>, StoreError> {
            self.inner.find_owned(owner, ids).await
        }
        async fn count_in_column(&self, owner: &OwnerId, column: Column) -> Result<u64, StoreError> {
            self.inner.count_in_column(owner, column).await
        }
        async fn page_in_column(
            &self,
            owner: &OwnerId,
            column: Column,
            skip: usize,
            limit: usize,
        ) -> Result<Vec<Task>, StoreError> {
            self.inner.page_in_column(owner, column, skip, limit).await
        }
        async fn siblings(
            &self,
            owner: &OwnerId,
            column: Column,
            exclude: Option<TaskId>,
        ) -> Result<Vec<Task>, StoreError> {
            self.inner.siblings(owner, column, exclude).await
        }
        async fn max_position(
            &self,
            owner: &OwnerId,
            column: Column,
        ) -> Result<Option<f64>, StoreError> {
            self.inner.max_position(owner, column).await
        }
        async fn insert(&self, task: &Task) -> Result<(), StoreError> {
            self.inner.insert(task).await
        }
        async fn save(&self, task: &Task) -> Result<(), StoreError> {
            if task.id == self.poisoned {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save(task).await
        }
        async fn delete(&self, id: TaskId) -> Result<bool, StoreError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn item_failure_does_not_abort_siblings() {
        let owner = OwnerId::new("alice");
        let inner = InMemoryTaskStore::new();
        let mut tasks = Vec::new();
        for n in 0..3 {
            let task = Task::new(
                owner.clone(),
                format!("t{n}"),
                String::new(),
                Column::Todo,
                n as f64,
            );
            inner.insert(&task).await.unwrap();
            tasks.push(task);
        }
        let store = Arc::new(FlakyStore {
            inner,
            poisoned: tasks[1].id,
        });
        let svc = TaskService::new(store, 10);

        let result = svc
            .apply_batch(
                &owner,
                BatchUpdateRequest {
                    updates: tasks.iter().map(|t| item(t, "done", 50.0)).collect(),
                },
            )
            .await
            .unwrap();

        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.failed[0].task_id, tasks[1].id.to_string());
        assert!(result.failed[0].error.contains("disk full"));
        assert_eq!(
            svc.store().get(tasks[2].id).await.unwrap().unwrap().column,
            Column::Done
        );
    }
}
