//! Per-column, cursor-paginated cache of the board.
//!
//! # Invariants
//! - A column's list only grows at the tail when a page loads; it is never
//!   re-sorted after an append, so indexes held by an in-progress drag stay
//!   valid.
//! - At most one page load per column is in flight. A second request for the
//!   same column returns immediately.
//! - Positions are plain numbers: responses are normalized at deserialization.
//! - The cursor's page number only moves forward until [`ColumnStore::reset`].
//! - A task id appears at most once across all columns. Offset pages can
//!   repeat a task that moved since the previous page; the repeat is skipped.
//! - A page that was requested before a reset or reload is discarded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{BoardTransport, ClientError};
use crate::board::{empty_columns, Column, ColumnMap, PageInfo, Task, TaskId};

/// Tasks and cursors for every column.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub tasks: ColumnMap<Vec<Task>>,
    pub pagination: ColumnMap<PageInfo>,
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self {
            tasks: empty_columns(),
            pagination: empty_columns(),
        }
    }
}

#[derive(Default)]
struct ColumnState {
    board: BoardSnapshot,
    loading: HashSet<Column>,
    /// Bumped whenever the board is replaced
    generation: u64,
}

pub struct ColumnStore {
    transport: Arc<dyn BoardTransport>,
    state: Mutex<ColumnState>,
}

/// Clears a column's in-flight mark when dropped, including when the load
/// future is cancelled mid-request.
struct LoadingGuard<'a> {
    store: &'a ColumnStore,
    column: Column,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.lock().loading.remove(&self.column);
    }
}

impl ColumnStore {
    pub fn new(transport: Arc<dyn BoardTransport>) -> Self {
        Self {
            transport,
            state: Mutex::new(ColumnState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ColumnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load page 1 of every column, replacing whatever was cached.
    ///
    /// On failure the cache is left as it was.
    pub async fn fetch_initial(&self) -> Result<BoardSnapshot, ClientError> {
        let response = match self.transport.fetch_tasks(1, None).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Error fetching initial tasks: {}", e);
                return Err(e);
            }
        };

        let mut snapshot = BoardSnapshot::default();
        snapshot.tasks.extend(response.tasks);
        snapshot.pagination.extend(response.pagination);

        {
            let mut state = self.lock();
            state.board = snapshot.clone();
            state.generation += 1;
        }
        tracing::debug!(
            tasks = snapshot.tasks.values().map(Vec::len).sum::<usize>(),
            "Loaded initial board"
        );
        Ok(snapshot)
    }

    /// Fetch the next page of `column` and append it.
    ///
    /// Returns how many tasks were appended. Does nothing (and returns `0`)
    /// when the column has no next page or a load for it is already running.
    pub async fn load_next_page(&self, column: Column) -> Result<usize, ClientError> {
        let (next_page, generation) = {
            let mut state = self.lock();
            if state.loading.contains(&column) {
                tracing::debug!(%column, "Page load already in flight");
                return Ok(0);
            }
            let cursor = state.board.pagination.get(&column).copied().unwrap_or_default();
            if !cursor.has_next_page {
                return Ok(0);
            }
            state.loading.insert(column);
            (cursor.page + 1, state.generation)
        };
        let _guard = LoadingGuard {
            store: self,
            column,
        };

        let mut response = match self.transport.fetch_tasks(next_page, Some(column)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Error loading next page for {}: {}", column, e);
                return Err(e);
            }
        };

        let page_tasks = response.tasks.remove(&column).unwrap_or_default();
        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(%column, page = next_page, "Discarding page from before reload");
            return Ok(0);
        }

        let known: HashSet<TaskId> = state
            .board
            .tasks
            .values()
            .flatten()
            .map(|t| t.id)
            .collect();
        let fresh: Vec<Task> = page_tasks
            .into_iter()
            .filter(|t| !known.contains(&t.id))
            .collect();
        let appended = fresh.len();
        state.board.tasks.entry(column).or_default().extend(fresh);
        if let Some(cursor) = response.pagination.remove(&column) {
            let current = state.board.pagination.entry(column).or_default();
            let page = cursor.page.max(current.page);
            *current = PageInfo { page, ..cursor };
        }
        Ok(appended)
    }

    /// Drop every cached task and cursor.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.board = BoardSnapshot::default();
        state.generation += 1;
    }

    pub fn tasks(&self, column: Column) -> Vec<Task> {
        self.lock().board.tasks.get(&column).cloned().unwrap_or_default()
    }

    pub fn pagination(&self, column: Column) -> PageInfo {
        self.lock()
            .board
            .pagination
            .get(&column)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_loading(&self, column: Column) -> bool {
        self.lock().loading.contains(&column)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.lock().board.clone()
    }

    /// Find a task in any column.
    pub fn find(&self, task_id: TaskId) -> Option<(Column, usize, Task)> {
        let state = self.lock();
        state.board.tasks.iter().find_map(|(column, tasks)| {
            tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|index| (*column, index, tasks[index].clone()))
        })
    }

    /// Append a task the server just created to its column.
    pub fn push_task(&self, task: Task) {
        self.lock().board.tasks.entry(task.column).or_default().push(task);
    }

    /// Remove a task from whichever column holds it.
    pub fn remove_task(&self, task_id: TaskId) -> Option<Task> {
        let mut state = self.lock();
        state.board.tasks.values_mut().find_map(|tasks| {
            let index = tasks.iter().position(|t| t.id == task_id)?;
            Some(tasks.remove(index))
        })
    }

    /// Mutate the column lists in one critical section.
    pub(crate) fn with_tasks_mut<R>(&self, f: impl FnOnce(&mut ColumnMap<Vec<Task>>) -> R) -> R {
        f(&mut self.lock().board.tasks)
    }
}
