use std::sync::Arc;
use std::time::Duration;

use crate::database::lancedb::VectorStore;
use crate::generation::Generator;
use crate::retrieval::RetrievalService;
use crate::tasks::TaskQueue;

/// Shared application state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: VectorStore,
    pub queue: TaskQueue,
    pub retrieval: RetrievalService,
    /// How long synchronous endpoints wait for the task they enqueued
    pub await_timeout: Duration,
}

impl AppState {
    #[inline]
    pub fn new(
        store: VectorStore,
        queue: TaskQueue,
        generator: Arc<dyn Generator>,
        await_timeout: Duration,
    ) -> Self {
        let retrieval = RetrievalService::new(store.clone(), generator);
        Self {
            store,
            queue,
            retrieval,
            await_timeout,
        }
    }
}
