//! Position hierarchy provider.
//!
//! The grade engine never reads levels directly from configuration; it asks a
//! [`HierarchyProvider`] for the active levels. [`ConfigLoader`](crate::config::ConfigLoader)
//! implements the trait for YAML configuration, and [`StaticHierarchy`] serves a
//! fixed list.

use crate::error::{EngineError, EngineResult};
use crate::models::{HierarchyLevel, sort_active};

/// Supplies the ordered list of active hierarchy levels.
pub trait HierarchyProvider: Send + Sync {
    /// Returns the active levels ordered ascending by level number (level 1 first).
    ///
    /// Fails with [`EngineError::Configuration`] when no active level exists.
    fn list_active_levels(&self) -> EngineResult<Vec<HierarchyLevel>>;
}

/// Orders `levels` for calculation, failing when none are active.
pub(crate) fn active_levels_or_err(levels: &[HierarchyLevel]) -> EngineResult<Vec<HierarchyLevel>> {
    let active = sort_active(levels);
    if active.is_empty() {
        return Err(EngineError::Configuration {
            message: "no active position levels are defined".to_string(),
        });
    }
    Ok(active)
}

/// A hierarchy provider backed by a fixed list of levels.
///
/// # Example
///
/// ```
/// use salary_grading::hierarchy::{HierarchyProvider, StaticHierarchy};
/// use salary_grading::models::HierarchyLevel;
///
/// let provider = StaticHierarchy::new(vec![
///     HierarchyLevel::new("Staff", 2),
///     HierarchyLevel::new("Director", 1),
/// ]);
/// let levels = provider.list_active_levels().unwrap();
/// assert_eq!(levels[0].name, "Director");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticHierarchy {
    levels: Vec<HierarchyLevel>,
}

impl StaticHierarchy {
    /// Creates a provider over the given levels.
    pub fn new(levels: Vec<HierarchyLevel>) -> Self {
        Self { levels }
    }
}

impl HierarchyProvider for StaticHierarchy {
    fn list_active_levels(&self) -> EngineResult<Vec<HierarchyLevel>> {
        active_levels_or_err(&self.levels)
    }
}
