//! Application state for the salary grading API.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use std::sync::Arc;

use crate::config::ConfigLoader;
use crate::error::EngineResult;
use crate::hierarchy::HierarchyProvider;
use crate::repository::ScenarioRepository;

/// Shared application state.
///
/// Contains resources that are shared across all request handlers: the loaded
/// configuration and the scenario repository.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ConfigLoader>,
    repository: Arc<ScenarioRepository>,
}

impl AppState {
    /// Creates a new application state with an empty scenario store.
    ///
    /// The configuration doubles as the hierarchy provider.
    pub fn new(config: ConfigLoader) -> Self {
        let config = Arc::new(config);
        let hierarchy: Arc<dyn HierarchyProvider> = config.clone();
        Self {
            repository: Arc::new(ScenarioRepository::new(hierarchy)),
            config,
        }
    }

    /// Returns a reference to the configuration loader.
    pub fn config(&self) -> &ConfigLoader {
        &self.config
    }

    /// Returns a reference to the scenario repository.
    pub fn repository(&self) -> &ScenarioRepository {
        &self.repository
    }

    /// Resolves a grading system id, failing when it is not configured.
    pub fn grading_system(&self, id: &str) -> EngineResult<String> {
        self.config.grading_system(id).map(|system| system.id.clone())
    }
}
