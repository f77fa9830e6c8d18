//! Core data models for the salary grading service.
//!
//! This module contains all the domain models used throughout the crate.

mod grade;
mod hierarchy;
mod rates;
mod scenario;

pub use grade::{DisplayGradeRow, GradePoint, GradeRow, GradeTable, SalaryGrade};
pub use hierarchy::{HierarchyLevel, sort_active};
pub use rates::{
    IntervalKey, IntervalRates, LevelRates, Percentage, RateMap, RawIntervals, RawLevelRates,
    RawRate, RawRateMap,
};
pub use scenario::{HistoryAction, Scenario, ScenarioHistory, ScenarioStatus};
