//! Application context shared across all route handlers via Axum state.
//!
//! Everything in [`AppContext`] is immutable after startup and wrapped in
//! `Arc`, so cloning it per request is cheap.

use std::sync::Arc;

use sc_av::ToolRegistry;
use sc_core::config::Config;
use sc_pipeline::{ArtifactStore, PipelineController};

/// Shared application state.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration.
    pub config: Arc<Config>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
    /// Upload-to-video pipeline.
    pub pipeline: Arc<PipelineController>,
}

impl AppContext {
    /// Build the context from a config and an already discovered registry.
    ///
    /// Creates the storage directories if they are missing.
    pub fn new(config: Config, tools: ToolRegistry) -> sc_core::Result<Self> {
        let config = Arc::new(config);
        let tools = Arc::new(tools);

        let store = ArtifactStore::new(&config.storage);
        store.ensure_dirs()?;

        let pipeline = Arc::new(PipelineController::new(
            config.clone(),
            tools.clone(),
            store,
        ));

        Ok(Self {
            config,
            tools,
            pipeline,
        })
    }

    pub fn store(&self) -> &ArtifactStore {
        self.pipeline.store()
    }
}
