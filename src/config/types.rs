//! Configuration types for the salary grading service.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use serde::Deserialize;

use crate::models::HierarchyLevel;

/// Position hierarchy configuration from `hierarchy.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HierarchyConfig {
    /// All configured levels, active or not.
    #[serde(default)]
    pub levels: Vec<HierarchyLevel>,
}

/// A grading system that scenarios can target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GradingSystem {
    /// Stable identifier used in API paths.
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

/// Service configuration from `service.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// The grading system used when a request does not name one.
    pub default_grading_system: String,
    /// All grading systems known to the service.
    pub grading_systems: Vec<GradingSystem>,
    /// Default number of scenarios per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Upper bound a client may request for a listing page.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

impl ServiceConfig {
    /// A single-system configuration, convenient for embedding and tests.
    pub fn single_system(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            bind_address: default_bind_address(),
            log_level: default_log_level(),
            default_grading_system: id.clone(),
            grading_systems: vec![GradingSystem {
                id,
                name: name.into(),
            }],
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_config_defaults() {
        let yaml = r#"
default_grading_system: standard
grading_systems:
  - id: standard
    name: Standard Grading
"#;
        let config: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.grading_systems[0].name, "Standard Grading");
    }

    #[test]
    fn test_hierarchy_config_reads_levels() {
        let yaml = r#"
levels:
  - name: CEO
    level: 1
  - name: Intern
    level: 9
    active: false
"#;
        let config: HierarchyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.levels.len(), 2);
        assert!(!config.levels[1].active);
    }
}
