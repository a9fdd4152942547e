//! # taskboard
//!
//! Ordering and persistence core for a kanban task board.
//!
//! This library provides:
//! - Fractional position keys that let a card be placed between any two
//!   others without renumbering its neighbors
//! - An HTTP API for paginated column reads, single-task edits and batched
//!   reorder writes
//! - A client core that applies drag-and-drop moves optimistically and
//!   coalesces them into debounced batch writes
//!
//! ## Architecture
//!
//! ```text
//!   client::BoardSession                         api (axum)
//!   ┌──────────────────────────┐                ┌──────────────────────┐
//!   │ ReorderEngine            │                │ /api/task            │
//!   │   │        │             │   HTTP/JSON    │ /api/task/batch      │
//!   │   ▼        ▼             │ ─────────────▶ │          │           │
//!   │ ColumnStore  BatchQueue  │                │  service::TaskService│
//!   └──────────────────────────┘                │          │           │
//!                                               │  store::TaskStore    │
//!                                               └──────────────────────┘
//! ```
//!
//! ## Modules
//! - `board`: Domain types and the position allocator
//! - `store`: Task persistence (SQLite or in-memory)
//! - `service`: Server-side operations, position resolver and batch apply
//! - `api`: HTTP routes, auth middleware and wire types
//! - `client`: Paginated cache, optimistic reorder engine and write queue

pub mod api;
pub mod board;
pub mod client;
pub mod config;
pub mod service;
pub mod store;
pub mod util;

pub use board::{Column, PendingUpdate, Task, TaskId};
pub use config::{ClientConfig, Config};
