use std::sync::Arc;

use scribe_core::PipelineFactory;

use crate::pipeline::Pipeline;
use crate::session::SessionStore;

/// Shared application state passed to all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(factory: Arc<dyn PipelineFactory>) -> Self {
        Self::with_sessions(factory, SessionStore::new())
    }

    pub fn with_sessions(factory: Arc<dyn PipelineFactory>, sessions: SessionStore) -> Self {
        Self {
            pipeline: Arc::new(Pipeline::new(factory)),
            sessions: Arc::new(sessions),
        }
    }
}
