//! Optimistic drag-and-drop reordering.
//!
//! A drop is applied to the [`ColumnStore`] immediately and queued for the
//! server; nothing here waits on the network, and nothing is rolled back if
//! the write later fails.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{BatchQueue, ColumnStore};
use crate::board::position::compute_position;
use crate::board::{Column, PendingUpdate, TaskId};

/// An in-progress drag gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragState {
    pub task_id: TaskId,
    pub source: Column,
    /// Column and index the drop indicator currently points at
    pub over: Option<(Column, usize)>,
}

pub struct ReorderEngine {
    columns: Arc<ColumnStore>,
    queue: BatchQueue,
    drag: Mutex<Option<DragState>>,
}

impl ReorderEngine {
    pub fn new(columns: Arc<ColumnStore>, queue: BatchQueue) -> Self {
        Self {
            columns,
            queue,
            drag: Mutex::new(None),
        }
    }

    fn drag(&self) -> MutexGuard<'_, Option<DragState>> {
        self.drag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `task_id` from `source` to `target` at `target_index` (appending
    /// when `None`), then queue the new state.
    ///
    /// `target_index` is the slot the user pointed at in the list as it was
    /// displayed, dragged card included. Returns the queued update, or `None`
    /// when the task is no longer in `source`.
    ///
    /// Inside a tokio runtime this also restarts the flush timer. Without one
    /// the update stays queued until [`BatchQueue::flush_now`].
    pub fn on_drop(
        &self,
        task_id: TaskId,
        source: Column,
        target: Column,
        target_index: Option<usize>,
    ) -> Option<PendingUpdate> {
        let update = self.columns.with_tasks_mut(|columns| {
            let source_list = columns.get_mut(&source)?;
            let original_index = source_list.iter().position(|t| t.id == task_id)?;
            let mut task = source_list.remove(original_index);

            let target_list = columns.entry(target).or_default();
            let siblings: Vec<f64> = target_list.iter().map(|t| t.position).collect();
            let index = match target_index {
                Some(i) if source == target && original_index < i => i - 1,
                Some(i) => i,
                None => siblings.len(),
            }
            .min(siblings.len());

            task.position = compute_position(&siblings, index);
            task.column = target;
            let update = task.to_pending_update();
            target_list.insert(index, task);
            Some(update)
        });

        match &update {
            Some(update) => {
                tracing::debug!(
                    %task_id,
                    from = %source,
                    to = %target,
                    position = update.position,
                    "Task moved"
                );
                self.queue.enqueue(update.clone());
            }
            None => tracing::debug!(%task_id, column = %source, "Dropped task no longer present"),
        }
        update
    }

    pub fn drag_start(&self, task_id: TaskId, source: Column) {
        *self.drag() = Some(DragState {
            task_id,
            source,
            over: None,
        });
    }

    /// Point the drop indicator at `index` in `column`.
    pub fn drag_over(&self, column: Column, index: usize) {
        if let Some(state) = self.drag().as_mut() {
            state.over = Some((column, index));
        }
    }

    pub fn drag_leave(&self) {
        if let Some(state) = self.drag().as_mut() {
            state.over = None;
        }
    }

    /// Finish the current drag on `target`, at the indicator if it points
    /// into `target` and at the end otherwise.
    pub fn drop_on(&self, target: Column) -> Option<PendingUpdate> {
        let state = self.drag().take()?;
        let index = state
            .over
            .filter(|(column, _)| *column == target)
            .map(|(_, index)| index);
        self.on_drop(state.task_id, state.source, target, index)
    }

    pub fn drag_state(&self) -> Option<DragState> {
        *self.drag()
    }

    pub fn columns(&self) -> &Arc<ColumnStore> {
        &self.columns
    }
}
