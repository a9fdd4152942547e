//! HTTP API for the board.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check (public)
//! - `GET /api/task` - Paginated tasks per column
//! - `POST /api/task` - Create a task
//! - `PUT /api/task` - Update a task, resolving a target index server-side
//! - `DELETE /api/task` - Delete a task
//! - `PATCH /api/task/batch` - Apply coalesced client updates

pub mod auth;
mod routes;
mod tasks;
pub mod types;

pub use routes::{app, serve, AppState};
pub use types::*;
