//! Task storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing and dev runs)
//! - `sqlite`: SQLite database
//!
//! The store is consumed as a document store: find by owner + column, sort
//! by position, skip/limit, and whole-document writes. It owns no ordering
//! logic of its own beyond sorting.

mod memory;
mod sqlite;

pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::board::{Column, OwnerId, Task, TaskId};

/// Path value that selects the in-memory backend.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Task {0} not found")]
    NotFound(TaskId),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt row for task {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Task store trait - implemented by all storage backends.
///
/// Every listing is in display order: ascending position, ties broken by id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Get a single task by id, regardless of owner.
    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Get every task among `ids` that belongs to `owner`.
    async fn find_owned(&self, owner: &OwnerId, ids: &[TaskId]) -> Result<Vec<Task>, StoreError>;

    /// Number of tasks in an owner's column.
    async fn count_in_column(&self, owner: &OwnerId, column: Column) -> Result<u64, StoreError>;

    /// One page of an owner's column.
    async fn page_in_column(
        &self,
        owner: &OwnerId,
        column: Column,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Task>, StoreError>;

    /// All tasks in an owner's column, optionally excluding one task.
    async fn siblings(
        &self,
        owner: &OwnerId,
        column: Column,
        exclude: Option<TaskId>,
    ) -> Result<Vec<Task>, StoreError>;

    /// Highest position in an owner's column, if it has any tasks.
    async fn max_position(&self, owner: &OwnerId, column: Column)
        -> Result<Option<f64>, StoreError>;

    /// Insert a new task.
    async fn insert(&self, task: &Task) -> Result<(), StoreError>;

    /// Overwrite an existing task. Fails with `NotFound` if it is gone.
    async fn save(&self, task: &Task) -> Result<(), StoreError>;

    /// Delete a task. Returns whether it existed.
    async fn delete(&self, id: TaskId) -> Result<bool, StoreError>;
}

pub type SharedTaskStore = Arc<dyn TaskStore>;

/// Open the backend selected by `database_path`.
///
/// Called once at startup; the handle is shared for the process lifetime and
/// dropped on shutdown.
pub async fn open_store(database_path: &Path) -> Result<SharedTaskStore, StoreError> {
    if database_path.as_os_str() == IN_MEMORY_PATH {
        tracing::info!("Using in-memory task store");
        return Ok(Arc::new(InMemoryTaskStore::new()));
    }
    tracing::info!("Opening SQLite task store at {}", database_path.display());
    let store = SqliteTaskStore::open(database_path.to_path_buf()).await?;
    Ok(Arc::new(store))
}
