//! Position hierarchy model.
//!
//! This module defines the [`HierarchyLevel`] type describing one rung of the
//! organisational ladder.

use serde::{Deserialize, Serialize};

/// A rung in the organisational ladder.
///
/// Levels are totally ordered by `level`: level 1 carries the highest authority,
/// and the largest level number is the base position from which grade
/// calculation starts.
///
/// # Example
///
/// ```
/// use salary_grading::models::HierarchyLevel;
///
/// let level = HierarchyLevel::new("Manager", 3);
/// assert!(level.active);
/// assert_eq!(level.level, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    /// Unique display label of the level.
    pub name: String,
    /// Position in the hierarchy (1 = highest authority).
    pub level: u32,
    /// Whether the level currently takes part in grading.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl HierarchyLevel {
    /// Creates an active level.
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
            active: true,
        }
    }
}

/// Returns the active levels sorted ascending by level number.
pub fn sort_active(levels: &[HierarchyLevel]) -> Vec<HierarchyLevel> {
    let mut active: Vec<HierarchyLevel> = levels.iter().filter(|l| l.active).cloned().collect();
    active.sort_by_key(|l| l.level);
    active
}
