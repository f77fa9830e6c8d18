//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the service
//! configuration and position hierarchy from YAML files.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::hierarchy::{HierarchyProvider, active_levels_or_err};
use crate::models::HierarchyLevel;

use super::types::{GradingSystem, HierarchyConfig, ServiceConfig};

/// Loads and provides access to service configuration.
///
/// # Directory Structure
///
/// ```text
/// config/default/
/// ├── service.yaml    # Bind address, log level, grading systems
/// └── hierarchy.yaml  # Position levels
/// ```
///
/// # Example
///
/// ```no_run
/// use salary_grading::config::ConfigLoader;
/// use salary_grading::hierarchy::HierarchyProvider;
///
/// let loader = ConfigLoader::load("./config/default").unwrap();
/// for level in loader.list_active_levels().unwrap() {
///     println!("{}: {}", level.level, level.name);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    service: ServiceConfig,
    hierarchy: HierarchyConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - Any required file is missing
    /// - Any file contains invalid YAML
    /// - Level names or level numbers are duplicated
    /// - The default grading system is not among the configured systems
    ///
    /// An empty level list is accepted here; the provider reports it when
    /// levels are requested.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let service_path = path.join("service.yaml");
        let service = Self::load_yaml::<ServiceConfig>(&service_path)?;

        let hierarchy_path = path.join("hierarchy.yaml");
        let hierarchy = Self::load_yaml::<HierarchyConfig>(&hierarchy_path)?;

        Self::check_service(&service, &service_path.display().to_string())?;
        Self::check_hierarchy(&hierarchy, &hierarchy_path.display().to_string())?;

        Ok(Self { service, hierarchy })
    }

    /// Builds a loader from already-parsed configuration.
    pub fn from_parts(service: ServiceConfig, levels: Vec<HierarchyLevel>) -> EngineResult<Self> {
        let hierarchy = HierarchyConfig { levels };
        Self::check_service(&service, "<memory>")?;
        Self::check_hierarchy(&hierarchy, "<memory>")?;
        Ok(Self { service, hierarchy })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    fn check_service(service: &ServiceConfig, path: &str) -> EngineResult<()> {
        let parse_error = |message: String| EngineError::ConfigParseError {
            path: path.to_string(),
            message,
        };

        if service.grading_systems.is_empty() {
            return Err(parse_error("at least one grading system is required".to_string()));
        }
        if !service
            .grading_systems
            .iter()
            .any(|s| s.id == service.default_grading_system)
        {
            return Err(parse_error(format!(
                "default grading system '{}' is not configured",
                service.default_grading_system
            )));
        }
        if service.page_size == 0 || service.page_size > service.max_page_size {
            return Err(parse_error(format!(
                "page_size {} must be between 1 and max_page_size {}",
                service.page_size, service.max_page_size
            )));
        }
        Ok(())
    }

    fn check_hierarchy(hierarchy: &HierarchyConfig, path: &str) -> EngineResult<()> {
        let mut names = HashSet::new();
        let mut numbers = HashSet::new();

        for level in &hierarchy.levels {
            if !names.insert(level.name.as_str()) {
                return Err(EngineError::ConfigParseError {
                    path: path.to_string(),
                    message: format!("duplicate level name '{}'", level.name),
                });
            }
            if level.active && !numbers.insert(level.level) {
                return Err(EngineError::ConfigParseError {
                    path: path.to_string(),
                    message: format!("duplicate active level number {}", level.level),
                });
            }
        }
        Ok(())
    }

    /// Returns the service configuration.
    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    /// Returns every configured level, including inactive ones.
    pub fn levels(&self) -> &[HierarchyLevel] {
        &self.hierarchy.levels
    }

    /// Gets a grading system by its id.
    pub fn grading_system(&self, id: &str) -> EngineResult<&GradingSystem> {
        self.service
            .grading_systems
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| EngineError::GradingSystemNotFound { id: id.to_string() })
    }

    /// Returns the default grading system.
    pub fn default_grading_system(&self) -> &str {
        &self.service.default_grading_system
    }
}

impl HierarchyProvider for ConfigLoader {
    fn list_active_levels(&self) -> EngineResult<Vec<HierarchyLevel>> {
        active_levels_or_err(&self.hierarchy.levels)
    }
}
