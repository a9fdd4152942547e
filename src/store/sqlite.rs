//! SQLite-based task store.

use super::{StoreError, TaskStore};
use crate::board::{position::END_GAP, Column, OwnerId, Task, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    column_key TEXT NOT NULL DEFAULT 'backlog',
    position REAL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_owner_column_position
    ON tasks(owner_id, column_key, position);
"#;

const SELECT_COLUMNS: &str =
    "id, owner_id, title, description, column_key, position, created_at, updated_at";

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    pub async fn open(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, StoreError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await?
    }
}

/// Column values in `SELECT_COLUMNS` order.
type RawRow = (
    String,
    String,
    String,
    String,
    String,
    Option<f64>,
    String,
    String,
);

/// A row as stored. Legacy rows may lack a position.
struct StoredTask {
    task: Task,
    has_position: bool,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("bad timestamp {value:?}: {e}"),
        })
}

fn decode(raw: RawRow) -> Result<StoredTask, StoreError> {
    let (id, owner_id, title, description, column_key, position, created_at, updated_at) = raw;
    let task_id: TaskId = id.parse().map_err(|e| StoreError::Corrupt {
        id: id.clone(),
        reason: format!("bad id: {e}"),
    })?;
    let column: Column = column_key.parse().map_err(|e| StoreError::Corrupt {
        id: id.clone(),
        reason: format!("{e}"),
    })?;
    Ok(StoredTask {
        task: Task {
            id: task_id,
            owner_id: OwnerId::new(owner_id),
            title,
            description,
            column,
            position: position.unwrap_or(0.0),
            created_at: parse_timestamp(&id, &created_at)?,
            updated_at: parse_timestamp(&id, &updated_at)?,
        },
        has_position: position.is_some(),
    })
}

/// Decode an ordered listing. Rows without a stored position get one spaced
/// by their index in the full column, starting at `offset`.
fn decode_listing(
    rows: Vec<RawRow>,
    offset: usize,
) -> Result<Vec<Task>, StoreError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let StoredTask {
                mut task,
                has_position,
            } = decode(raw)?;
            if !has_position {
                task.position = (offset + index) as f64 * END_GAP;
                tracing::debug!(
                    "Assigned position {} to task {} with no stored position",
                    task.position,
                    task.id
                );
            }
            Ok(task)
        })
        .collect()
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        self.with_conn(move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?1"),
                    params![id.to_string()],
                    read_row,
                )
                .optional()?;
            raw.map(|raw| decode(raw).map(|stored| stored.task))
                .transpose()
        })
        .await
    }

    async fn find_owned(&self, owner: &OwnerId, ids: &[TaskId]) -> Result<Vec<Task>, StoreError> {
        let mut ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let owner = owner.as_str().to_string();
        self.with_conn(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM tasks WHERE owner_id = ? AND id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let params = std::iter::once(owner).chain(ids);
            let rows = stmt
                .query_map(params_from_iter(params), read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|raw| decode(raw).map(|stored| stored.task))
                .collect()
        })
        .await
    }

    async fn count_in_column(&self, owner: &OwnerId, column: Column) -> Result<u64, StoreError> {
        let owner = owner.as_str().to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE owner_id = ?1 AND column_key = ?2",
                params![owner, column.as_str()],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn page_in_column(
        &self,
        owner: &OwnerId,
        column: Column,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Task>, StoreError> {
        let owner = owner.as_str().to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM tasks
                 WHERE owner_id = ?1 AND column_key = ?2
                 ORDER BY position ASC, id ASC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt
                .query_map(
                    params![owner, column.as_str(), limit as i64, skip as i64],
                    read_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            decode_listing(rows, skip)
        })
        .await
    }

    async fn siblings(
        &self,
        owner: &OwnerId,
        column: Column,
        exclude: Option<TaskId>,
    ) -> Result<Vec<Task>, StoreError> {
        let owner = owner.as_str().to_string();
        let exclude = exclude.map(|id| id.to_string()).unwrap_or_default();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM tasks
                 WHERE owner_id = ?1 AND column_key = ?2 AND id != ?3
                 ORDER BY position ASC, id ASC"
            ))?;
            let rows = stmt
                .query_map(params![owner, column.as_str(), exclude], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            decode_listing(rows, 0)
        })
        .await
    }

    async fn max_position(
        &self,
        owner: &OwnerId,
        column: Column,
    ) -> Result<Option<f64>, StoreError> {
        let owner = owner.as_str().to_string();
        self.with_conn(move |conn| {
            let max: Option<f64> = conn.query_row(
                "SELECT MAX(position) FROM tasks WHERE owner_id = ?1 AND column_key = ?2",
                params![owner, column.as_str()],
                |row| row.get(0),
            )?;
            Ok(max)
        })
        .await
    }

    async fn insert(&self, task: &Task) -> Result<(), StoreError> {
        let task = task.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, owner_id, title, description, column_key, position, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id.to_string(),
                    task.owner_id.as_str(),
                    task.title,
                    task.description,
                    task.column.as_str(),
                    task.position,
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save(&self, task: &Task) -> Result<(), StoreError> {
        let task = task.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET title = ?2, description = ?3, column_key = ?4, position = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    task.id.to_string(),
                    task.title,
                    task.description,
                    task.column.as_str(),
                    task.position,
                    task.updated_at.to_rfc3339(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(task.id));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: TaskId) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
            Ok(changed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn legacy_rows_without_position_are_spaced_by_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteTaskStore::open(dir.path().join("legacy.db"))
            .await
            .expect("open");
        let owner = OwnerId::new("legacy-user");

        let now = Utc::now().to_rfc3339();
        let ids: Vec<TaskId> = (0..3).map(|_| TaskId::new()).collect();
        {
            let conn = store.conn.lock().await;
            for (n, id) in ids.iter().enumerate() {
                conn.execute(
                    "INSERT INTO tasks (id, owner_id, title, column_key, position, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 'todo', NULL, ?4, ?4)",
                    params![id.to_string(), owner.as_str(), format!("legacy {n}"), now],
                )
                .expect("insert legacy row");
            }
        }

        let first = store
            .page_in_column(&owner, Column::Todo, 0, 2)
            .await
            .expect("page 1");
        let second = store
            .page_in_column(&owner, Column::Todo, 2, 2)
            .await
            .expect("page 2");
        let positions: Vec<f64> = first.iter().chain(&second).map(|t| t.position).collect();
        assert_eq!(positions, vec![0.0, 10.0, 20.0]);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("tasks.db");
        let owner = OwnerId::new("u");
        let task = Task::new(owner.clone(), "keep".into(), String::new(), Column::Done, 4.5);
        {
            let store = SqliteTaskStore::open(path.clone()).await.expect("open");
            store.insert(&task).await.expect("insert");
        }
        let store = SqliteTaskStore::open(path).await.expect("reopen");
        let loaded = store.get(task.id).await.expect("get").expect("exists");
        assert_eq!(loaded.title, "keep");
        assert_eq!(loaded.position, 4.5);
        assert_eq!(loaded.column, Column::Done);
    }
}
