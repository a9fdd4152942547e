//! Authoritative position resolution for single-task moves.

use crate::board::position::compute_position;
use crate::board::{Column, OwnerId, TaskId};
use crate::store::{StoreError, TaskStore};

/// Position key for `task_id` dropped at `target_index` of `column`.
///
/// Reads the owner's current siblings (excluding the task itself) and runs
/// the shared allocator over them, so a move made from a stale client view
/// still lands consistently with what the server holds now.
pub async fn resolve_position(
    store: &dyn TaskStore,
    owner: &OwnerId,
    column: Column,
    task_id: TaskId,
    target_index: usize,
) -> Result<f64, StoreError> {
    let siblings: Vec<f64> = store
        .siblings(owner, column, Some(task_id))
        .await?
        .into_iter()
        .map(|t| t.position)
        .collect();
    let position = compute_position(&siblings, target_index);
    tracing::debug!(
        %task_id,
        %column,
        target_index,
        siblings = siblings.len(),
        position,
        "Resolved position"
    );
    Ok(position)
}
