//! Client-side board core.
//!
//! Keeps a paginated cache of every column, applies drag-and-drop moves to it
//! optimistically and ships the resulting state to the server in debounced,
//! coalesced batches.
//!
//! ```text
//! ReorderEngine ──> ColumnStore   (optimistic local state)
//!        │
//!        └────────> BatchQueue ──> BoardTransport ──> PATCH /api/task/batch
//! ```

mod columns;
mod queue;
mod reorder;
mod session;
mod transport;

pub use columns::{BoardSnapshot, ColumnStore};
pub use queue::{BatchQueue, FlushOutcome};
pub use reorder::{DragState, ReorderEngine};
pub use session::BoardSession;
pub use transport::{BoardTransport, HttpTransport};

/// Errors raised while talking to the board API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
