//! In-memory task store (non-persistent).

use super::{StoreError, TaskStore};
use crate::board::{display_order, Column, OwnerId, Task, TaskId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn column(&self, owner: &OwnerId, column: Column) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| &t.owner_id == owner && t.column == column)
            .cloned()
            .collect();
        tasks.sort_by(display_order);
        tasks
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn find_owned(&self, owner: &OwnerId, ids: &[TaskId]) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.read().await;
        let mut found: Vec<Task> = Vec::new();
        for id in ids {
            if found.iter().any(|t| t.id == *id) {
                continue;
            }
            if let Some(task) = tasks.get(id).filter(|t| &t.owner_id == owner) {
                found.push(task.clone());
            }
        }
        Ok(found)
    }

    async fn count_in_column(&self, owner: &OwnerId, column: Column) -> Result<u64, StoreError> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| &t.owner_id == owner && t.column == column)
            .count() as u64)
    }

    async fn page_in_column(
        &self,
        owner: &OwnerId,
        column: Column,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .column(owner, column)
            .await
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect())
    }

    async fn siblings(
        &self,
        owner: &OwnerId,
        column: Column,
        exclude: Option<TaskId>,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.column(owner, column).await;
        if let Some(exclude) = exclude {
            tasks.retain(|t| t.id != exclude);
        }
        Ok(tasks)
    }

    async fn max_position(
        &self,
        owner: &OwnerId,
        column: Column,
    ) -> Result<Option<f64>, StoreError> {
        Ok(self
            .column(owner, column)
            .await
            .last()
            .map(|t| t.position))
    }

    async fn insert(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn save(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let slot = tasks.get_mut(&task.id).ok_or(StoreError::NotFound(task.id))?;
        *slot = task.clone();
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<bool, StoreError> {
        Ok(self.tasks.write().await.remove(&id).is_some())
    }
}
