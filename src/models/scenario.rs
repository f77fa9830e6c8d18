//! Scenario and scenario history models.
//!
//! A [`Scenario`] is a named proposal for a full grade table. Scenarios move
//! through `Draft -> Current -> Archived`; every transition is recorded as a
//! [`ScenarioHistory`] entry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GradeTable, IntervalRates, RateMap};

/// Lifecycle status of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioStatus {
    /// Editable proposal; may be recalculated any number of times.
    Draft,
    /// The scenario whose grades are materialised for its grading system.
    Current,
    /// Terminal state.
    Archived,
}

impl ScenarioStatus {
    /// The wire label of the status.
    pub fn label(self) -> &'static str {
        match self {
            ScenarioStatus::Draft => "DRAFT",
            ScenarioStatus::Current => "CURRENT",
            ScenarioStatus::Archived => "ARCHIVED",
        }
    }
}

/// A salary grade scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique identifier.
    pub id: Uuid,
    /// The grading system the scenario belongs to.
    pub grading_system_id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Lifecycle status.
    pub status: ScenarioStatus,
    /// Lower decile of the base level.
    #[serde(with = "rust_decimal::serde::float")]
    pub base_value: Decimal,
    /// Level names, highest authority first, used at calculation time.
    pub level_order: Vec<String>,
    /// Rate inputs keyed by level name.
    pub rate_inputs: RateMap,
    /// The shared horizontal intervals, when the scenario was submitted in that shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_horizontal_intervals: Option<IntervalRates>,
    /// The derived grade table; `None` until calculated.
    pub calculated_grades: Option<GradeTable>,
    /// Mean vertical rate as a fraction.
    #[serde(with = "rust_decimal::serde::float")]
    pub vertical_avg: Decimal,
    /// Mean horizontal rate as a fraction.
    #[serde(with = "rust_decimal::serde::float")]
    pub horizontal_avg: Decimal,
    /// When the grades were last calculated.
    pub calculated_at: Option<DateTime<Utc>>,
    /// Who created the scenario.
    pub created_by: String,
    /// When the scenario was created.
    pub created_at: DateTime<Utc>,
    /// Who applied the scenario as current.
    pub applied_by: Option<String>,
    /// When the scenario was applied as current.
    pub applied_at: Option<DateTime<Utc>>,
}

impl Scenario {
    /// Returns true while the scenario is a draft.
    pub fn is_draft(&self) -> bool {
        self.status == ScenarioStatus::Draft
    }

    /// Returns true when a non-empty grade table has been calculated.
    pub fn is_calculated(&self) -> bool {
        self.calculated_grades
            .as_ref()
            .is_some_and(|grades| !grades.is_empty())
    }
}

/// A lifecycle action recorded in scenario history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    /// The scenario was created.
    Created,
    /// Grades were (re)calculated.
    Calculated,
    /// The scenario was applied as current.
    Applied,
    /// The scenario was archived.
    Archived,
}

/// An append-only record of one lifecycle action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioHistory {
    /// Unique identifier of the entry.
    pub id: Uuid,
    /// The scenario the action applied to.
    pub scenario_id: Uuid,
    /// The grading system of the scenario.
    pub grading_system_id: String,
    /// The action performed.
    pub action: HistoryAction,
    /// The scenario that was current before an apply, if any.
    pub previous_current_scenario_id: Option<Uuid>,
    /// Structured description of what changed.
    pub changes_made: serde_json::Value,
    /// Who performed the action.
    pub performed_by: String,
    /// When the action was performed.
    pub timestamp: DateTime<Utc>,
}
