//! Configuration loading and management for the salary grading service.
//!
//! This module loads the service settings and the position hierarchy from YAML
//! files. The loaded [`ConfigLoader`] doubles as the
//! [`HierarchyProvider`](crate::hierarchy::HierarchyProvider) used by the engine.
//!
//! # Example
//!
//! ```no_run
//! use salary_grading::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! println!("Default grading system: {}", config.default_grading_system());
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{GradingSystem, HierarchyConfig, ServiceConfig};
