//! Board domain types shared by the server and the client core.
//!
//! # Invariants
//! - Within one (owner, column) pair, `position` values order the cards the
//!   way the user placed them. Ties may exist transiently and are broken by
//!   task id.
//! - `title` is trimmed and 1..=255 characters, `description` trimmed and at
//!   most 2000 characters.

pub mod position;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum title length in characters (after trimming).
pub const MAX_TITLE_LEN: usize = 255;

/// Maximum description length in characters (after trimming).
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Workflow stage a task lives in. The set is closed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    #[default]
    Backlog,
    Todo,
    InProgress,
    Done,
}

impl Column {
    /// All columns in board order.
    pub const ALL: [Column; 4] = [
        Column::Backlog,
        Column::Todo,
        Column::InProgress,
        Column::Done,
    ];

    /// Wire / storage key for this column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Backlog => "backlog",
            Column::Todo => "todo",
            Column::InProgress => "inProgress",
            Column::Done => "done",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| FieldError::InvalidColumn(s.to_string()))
    }
}

/// Stable, opaque task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Identifier of the user owning a set of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A card on the board.
///
/// `position` is always a plain number once deserialized; boxed decimals are
/// unwrapped at the serde boundary (see [`position::deserialize`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(alias = "_id")]
    pub id: TaskId,
    #[serde(alias = "userId")]
    pub owner_id: OwnerId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub column: Column,
    #[serde(default, deserialize_with = "position::deserialize")]
    pub position: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a new task with fresh id and timestamps.
    pub fn new(
        owner_id: OwnerId,
        title: String,
        description: String,
        column: Column,
        position: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            owner_id,
            title,
            description,
            column,
            position,
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot of the writable fields, as queued for a batch write.
    pub fn to_pending_update(&self) -> PendingUpdate {
        PendingUpdate {
            task_id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            column: self.column,
            position: self.position,
        }
    }
}

/// Ordering used everywhere a column is listed: ascending position, then id.
pub fn display_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    a.position.total_cmp(&b.position).then_with(|| a.id.cmp(&b.id))
}

/// Latest desired state of one task since the last flush.
///
/// At most one exists per task id in the client queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub column: Column,
    pub position: f64,
}

/// Cursor for one column's paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    #[serde(default)]
    pub has_prev_page: bool,
}

impl PageInfo {
    /// Cursor for page `page` of a column holding `total` tasks.
    pub fn for_page(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit)) as u32
        };
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

impl Default for PageInfo {
    /// State before the first load: page 1, assumed to have more.
    fn default() -> Self {
        Self {
            page: 1,
            limit: 0,
            total: 0,
            total_pages: 0,
            has_next_page: true,
            has_prev_page: false,
        }
    }
}

/// Per-column map, serialized as an object keyed by column name.
pub type ColumnMap<T> = BTreeMap<Column, T>;

/// A map with an (empty) entry for every column.
pub fn empty_columns<T: Default>() -> ColumnMap<T> {
    Column::ALL.into_iter().map(|c| (c, T::default())).collect()
}

/// Field validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Title is required")]
    TitleRequired,

    #[error("Title cannot exceed 255 characters")]
    TitleTooLong,

    #[error("Description cannot exceed 2000 characters")]
    DescriptionTooLong,

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),
}

/// Trim and validate a title.
pub fn normalize_title(raw: &str) -> Result<String, FieldError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(FieldError::TitleRequired);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(FieldError::TitleTooLong);
    }
    Ok(title.to_string())
}

/// Trim and validate a description. Missing means empty.
pub fn normalize_description(raw: Option<&str>) -> Result<String, FieldError> {
    let description = raw.unwrap_or("").trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(FieldError::DescriptionTooLong);
    }
    Ok(description.to_string())
}
