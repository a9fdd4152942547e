//! One open board view: cache, reorder engine and write queue wired together.

use std::sync::Arc;
use std::time::Duration;

use super::{
    BatchQueue, BoardSnapshot, BoardTransport, ClientError, ColumnStore, FlushOutcome,
    HttpTransport, ReorderEngine,
};
use crate::config::ClientConfig;

pub struct BoardSession {
    columns: Arc<ColumnStore>,
    queue: BatchQueue,
    engine: ReorderEngine,
}

impl BoardSession {
    pub fn new(transport: Arc<dyn BoardTransport>, flush_delay: Duration) -> Self {
        let columns = Arc::new(ColumnStore::new(Arc::clone(&transport)));
        let queue = BatchQueue::new(transport, flush_delay);
        let engine = ReorderEngine::new(Arc::clone(&columns), queue.clone());
        Self {
            columns,
            queue,
            engine,
        }
    }

    /// Session talking to the server described by `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::new(transport, config.flush_delay))
    }

    pub fn columns(&self) -> &ColumnStore {
        &self.columns
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    pub fn engine(&self) -> &ReorderEngine {
        &self.engine
    }

    /// Load the first page of every column.
    pub async fn load(&self) -> Result<BoardSnapshot, ClientError> {
        self.columns.fetch_initial().await
    }

    /// Close the view: flush what is queued, then drop the cache.
    pub async fn teardown(&self) -> FlushOutcome {
        let outcome = self.queue.cleanup_and_flush().await;
        self.columns.reset();
        outcome
    }
}
