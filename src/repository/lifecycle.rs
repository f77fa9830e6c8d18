//! Scenario lifecycle operations.
//!
//! ```text
//! DRAFT --calculate--> DRAFT
//! DRAFT --apply------> CURRENT   (previous CURRENT, if any, -> ARCHIVED)
//! DRAFT --archive----> ARCHIVED
//! CURRENT --archive--> ARCHIVED  (system left without a CURRENT scenario)
//! ```
//!
//! Each operation runs as a single [`Transaction`]; every transition appends
//! one [`ScenarioHistory`] entry in the same transaction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculation::{ScenarioComparison, ScenarioMetrics, calculate_grades, compare};
use crate::error::{EngineError, EngineResult};
use crate::hierarchy::HierarchyProvider;
use crate::models::{
    DisplayGradeRow, GradeTable, HierarchyLevel, HistoryAction, IntervalRates, RateMap,
    SalaryGrade, Scenario, ScenarioHistory, ScenarioStatus,
};

use super::query::{Page, ScenarioQuery, run_query};
use super::store::{ScenarioStore, Transaction};

/// Input for creating a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScenario {
    /// The grading system the scenario belongs to.
    pub grading_system_id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Lower decile of the base level; must be positive.
    pub base_value: Decimal,
    /// Level names, highest authority first.
    pub level_order: Vec<String>,
    /// Validated rate inputs.
    pub rate_inputs: RateMap,
    /// The shared horizontal intervals, if supplied in that shape.
    pub global_horizontal_intervals: Option<IntervalRates>,
}

/// Points in [`ScenarioRepository::apply`] after which a checkpoint runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStep {
    /// The previous CURRENT scenario was archived and the APPLIED entry written.
    PreviousArchived,
    /// The scenario was marked CURRENT.
    MarkedCurrent,
    /// The materialised grades were replaced.
    GradesReplaced,
}

/// One row of the current grade structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureRow {
    /// The level name.
    pub level_name: String,
    /// The level number.
    pub level: u32,
    /// The grade points, blank where no grade is materialised.
    pub grades: DisplayGradeRow,
}

/// The materialised grade table of a grading system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentStructure {
    /// The grading system.
    pub grading_system_id: String,
    /// The scenario the grades came from, if one was ever applied.
    pub source_scenario_id: Option<Uuid>,
    /// One row per active level, highest authority first.
    pub rows: Vec<StructureRow>,
}

/// Scenario persistence and lifecycle rules.
pub struct ScenarioRepository {
    store: ScenarioStore,
    hierarchy: Arc<dyn HierarchyProvider>,
}

fn history_entry(
    scenario: &Scenario,
    action: HistoryAction,
    previous_current_scenario_id: Option<Uuid>,
    changes_made: serde_json::Value,
    actor: &str,
    timestamp: DateTime<Utc>,
) -> ScenarioHistory {
    ScenarioHistory {
        id: Uuid::new_v4(),
        scenario_id: scenario.id,
        grading_system_id: scenario.grading_system_id.clone(),
        action,
        previous_current_scenario_id,
        changes_made,
        performed_by: actor.to_string(),
        timestamp,
    }
}

fn invalid_state(scenario: &Scenario, message: impl Into<String>) -> EngineError {
    EngineError::InvalidState {
        scenario_id: scenario.id,
        message: message.into(),
    }
}

impl ScenarioRepository {
    /// Creates a repository over an empty store.
    pub fn new(hierarchy: Arc<dyn HierarchyProvider>) -> Self {
        Self::with_store(ScenarioStore::new(), hierarchy)
    }

    /// Creates a repository over an existing store.
    pub fn with_store(store: ScenarioStore, hierarchy: Arc<dyn HierarchyProvider>) -> Self {
        Self { store, hierarchy }
    }

    /// The underlying store.
    pub fn store(&self) -> &ScenarioStore {
        &self.store
    }

    /// The hierarchy used for calculation.
    pub fn hierarchy(&self) -> &dyn HierarchyProvider {
        self.hierarchy.as_ref()
    }

    /// Creates a DRAFT scenario and records a CREATED entry.
    pub fn create(&self, new: NewScenario, actor: &str) -> EngineResult<Scenario> {
        let mut tx = self.store.begin(&new.grading_system_id)?;
        let scenario = Self::insert_draft_from(&mut tx, new, None, actor, Utc::now())?;
        self.store.commit(tx)?;

        info!(
            scenario_id = %scenario.id,
            grading_system = %scenario.grading_system_id,
            actor = %actor,
            "Created draft scenario"
        );
        Ok(scenario)
    }

    /// Creates a DRAFT scenario and calculates it server-side in one transaction.
    ///
    /// Grades are always derived from the stored rates, so the saved table matches
    /// what the engine produces for them.
    pub fn save_draft(&self, new: NewScenario, actor: &str) -> EngineResult<Scenario> {
        let levels = self.hierarchy.list_active_levels()?;
        let now = Utc::now();
        let mut tx = self.store.begin(&new.grading_system_id)?;
        let draft = Self::insert_draft_from(&mut tx, new, None, actor, now)?;
        let scenario = Self::calculate_in(&mut tx, draft.id, &levels, actor, now)?;
        self.store.commit(tx)?;

        info!(
            scenario_id = %scenario.id,
            grading_system = %scenario.grading_system_id,
            actor = %actor,
            "Saved calculated draft scenario"
        );
        Ok(scenario)
    }

    /// Recalculates a DRAFT scenario's grades and averages.
    ///
    /// Each call overwrites the previous result and records a CALCULATED entry.
    pub fn calculate(&self, scenario_id: Uuid, actor: &str) -> EngineResult<Scenario> {
        let levels = self.hierarchy.list_active_levels()?;
        let system = self.store.scenario(scenario_id)?.grading_system_id;
        let mut tx = self.store.begin(&system)?;
        let scenario = Self::calculate_in(&mut tx, scenario_id, &levels, actor, Utc::now())?;
        self.store.commit(tx)?;

        info!(
            scenario_id = %scenario.id,
            vertical_avg = %scenario.vertical_avg,
            horizontal_avg = %scenario.horizontal_avg,
            "Calculated scenario"
        );
        Ok(scenario)
    }

    /// Promotes a calculated DRAFT scenario to CURRENT.
    ///
    /// Archives the previous CURRENT scenario of the same grading system, records
    /// an APPLIED entry, and replaces the materialised grades, all in one
    /// transaction. A concurrent apply on the same system fails with `Conflict`.
    pub fn apply(&self, scenario_id: Uuid, actor: &str) -> EngineResult<Scenario> {
        self.apply_with_checkpoint(scenario_id, actor, &mut |_| Ok(()))
    }

    pub(crate) fn apply_with_checkpoint(
        &self,
        scenario_id: Uuid,
        actor: &str,
        checkpoint: &mut dyn FnMut(ApplyStep) -> EngineResult<()>,
    ) -> EngineResult<Scenario> {
        let levels = self.hierarchy.list_active_levels()?;
        let system = self.store.scenario(scenario_id)?.grading_system_id;
        let mut tx = self.store.begin(&system)?;

        let (scenario, previous) =
            Self::apply_in(&mut tx, scenario_id, &levels, actor, Utc::now(), checkpoint)?;

        if let Err(err) = self.store.commit(tx) {
            warn!(scenario_id = %scenario_id, error = %err, "Apply rolled back");
            return Err(err);
        }

        info!(
            scenario_id = %scenario.id,
            grading_system = %scenario.grading_system_id,
            previous_current = ?previous,
            actor = %actor,
            "Applied scenario as current"
        );
        Ok(scenario)
    }

    /// Archives a DRAFT or CURRENT scenario.
    ///
    /// Archiving the CURRENT scenario leaves the grading system without one; its
    /// materialised grades are kept. Archiving an ARCHIVED scenario is an
    /// `InvalidState` error.
    pub fn archive(&self, scenario_id: Uuid, actor: &str) -> EngineResult<Scenario> {
        let system = self.store.scenario(scenario_id)?.grading_system_id;
        let mut tx = self.store.begin(&system)?;
        let mut scenario = tx.scenario(scenario_id)?.clone();

        if scenario.status == ScenarioStatus::Archived {
            return Err(invalid_state(&scenario, "scenario is already archived"));
        }

        let previous_status = scenario.status;
        scenario.status = ScenarioStatus::Archived;
        tx.append_history(history_entry(
            &scenario,
            HistoryAction::Archived,
            None,
            json!({ "previous_status": previous_status.label() }),
            actor,
            Utc::now(),
        ));
        tx.put(scenario.clone());
        self.store.commit(tx)?;

        info!(
            scenario_id = %scenario.id,
            previous_status = previous_status.label(),
            actor = %actor,
            "Archived scenario"
        );
        Ok(scenario)
    }

    /// Copies a scenario's inputs into a new, uncalculated DRAFT.
    ///
    /// The copy is named `"<name> (Copy)"`, or `"<name> (Copy N)"` when that name
    /// is taken in the grading system.
    pub fn duplicate(&self, scenario_id: Uuid, actor: &str) -> EngineResult<Scenario> {
        let system = self.store.scenario(scenario_id)?.grading_system_id;
        let mut tx = self.store.begin(&system)?;
        let source = tx.scenario(scenario_id)?.clone();

        let name = Self::unique_copy_name(&tx, &source.name);
        let new = NewScenario {
            grading_system_id: source.grading_system_id.clone(),
            name,
            description: source.description.clone(),
            base_value: source.base_value,
            level_order: source.level_order.clone(),
            rate_inputs: source.rate_inputs.clone(),
            global_horizontal_intervals: source.global_horizontal_intervals,
        };
        let now = Utc::now();
        let copy = Self::insert_draft_from(&mut tx, new, Some(source.id), actor, now)?;
        self.store.commit(tx)?;

        info!(
            scenario_id = %copy.id,
            source_scenario_id = %source.id,
            name = %copy.name,
            "Duplicated scenario"
        );
        Ok(copy)
    }

    /// Reads a scenario.
    pub fn get(&self, scenario_id: Uuid) -> EngineResult<Scenario> {
        self.store.scenario(scenario_id)
    }

    /// Lists scenarios of a grading system.
    pub fn list(&self, grading_system: &str, query: &ScenarioQuery) -> EngineResult<Page<Scenario>> {
        Ok(run_query(self.store.scenarios(grading_system)?, query))
    }

    /// The CURRENT scenario of a grading system, if any.
    pub fn current_scenario(&self, grading_system: &str) -> EngineResult<Option<Scenario>> {
        Ok(self
            .store
            .scenarios(grading_system)?
            .into_iter()
            .find(|s| s.status == ScenarioStatus::Current))
    }

    /// The history of a scenario, oldest first.
    pub fn history(&self, scenario_id: Uuid) -> EngineResult<Vec<ScenarioHistory>> {
        self.store.scenario(scenario_id)?;
        let mut entries = self.store.history_for(scenario_id)?;
        entries.sort_by_key(|h| h.timestamp);
        Ok(entries)
    }

    /// The history of every scenario in a grading system, oldest first.
    pub fn system_history(&self, grading_system: &str) -> EngineResult<Vec<ScenarioHistory>> {
        let mut entries = self.store.history_for_system(grading_system)?;
        entries.sort_by_key(|h| h.timestamp);
        Ok(entries)
    }

    /// The materialised grades of a grading system.
    pub fn materialized_grades(&self, grading_system: &str) -> EngineResult<Vec<SalaryGrade>> {
        self.store.grades(grading_system)
    }

    /// Compares a calculated scenario with the materialised grades of its system.
    pub fn comparison(&self, scenario_id: Uuid) -> EngineResult<ScenarioComparison> {
        let scenario = self.store.scenario(scenario_id)?;
        if !scenario.is_calculated() {
            return Err(invalid_state(&scenario, "scenario has not been calculated"));
        }
        let current = self.store.grades(&scenario.grading_system_id)?;
        compare(&scenario, &current)
    }

    /// The current grade structure: one row per active level.
    ///
    /// Fails with `Configuration` when no position levels exist.
    pub fn current_structure(&self, grading_system: &str) -> EngineResult<CurrentStructure> {
        let levels = self.hierarchy.list_active_levels()?;
        let grades = self.store.grades(grading_system)?;
        let by_level: HashMap<&str, &SalaryGrade> = grades
            .iter()
            .map(|g| (g.level_name.as_str(), g))
            .collect();

        let rows = levels
            .into_iter()
            .map(|level| {
                let grades = by_level
                    .get(level.name.as_str())
                    .map(|g| DisplayGradeRow::from(g.grades))
                    .unwrap_or_default();
                StructureRow {
                    level_name: level.name,
                    level: level.level,
                    grades,
                }
            })
            .collect();

        Ok(CurrentStructure {
            grading_system_id: grading_system.to_string(),
            source_scenario_id: grades.first().map(|g| g.source_scenario_id),
            rows,
        })
    }

    fn insert_draft_from(
        tx: &mut Transaction,
        new: NewScenario,
        duplicated_from: Option<Uuid>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Scenario> {
        if new.base_value <= Decimal::ZERO {
            return Err(EngineError::InvalidInput {
                field: "base_value".to_string(),
                message: format!("must be greater than 0, got {}", new.base_value),
            });
        }
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::InvalidInput {
                field: "name".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let scenario = Scenario {
            id: Uuid::new_v4(),
            grading_system_id: tx.grading_system().to_string(),
            name,
            description: new.description,
            status: ScenarioStatus::Draft,
            base_value: new.base_value,
            level_order: new.level_order,
            rate_inputs: new.rate_inputs,
            global_horizontal_intervals: new.global_horizontal_intervals,
            calculated_grades: None,
            vertical_avg: Decimal::ZERO,
            horizontal_avg: Decimal::ZERO,
            calculated_at: None,
            created_by: actor.to_string(),
            created_at: now,
            applied_by: None,
            applied_at: None,
        };

        let mut changes = json!({ "name": scenario.name, "base_value": scenario.base_value });
        if let Some(source) = duplicated_from {
            changes["duplicated_from"] = json!(source);
        }
        tx.append_history(history_entry(
            &scenario,
            HistoryAction::Created,
            None,
            changes,
            actor,
            now,
        ));
        tx.put(scenario.clone());
        Ok(scenario)
    }

    fn calculate_in(
        tx: &mut Transaction,
        scenario_id: Uuid,
        levels: &[HierarchyLevel],
        actor: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Scenario> {
        let mut scenario = tx.scenario(scenario_id)?.clone();
        if !scenario.is_draft() {
            return Err(invalid_state(
                &scenario,
                format!(
                    "only DRAFT scenarios can be calculated (status is {})",
                    scenario.status.label()
                ),
            ));
        }

        let calculation = calculate_grades(scenario.base_value, levels, &scenario.rate_inputs)?;
        let metrics = ScenarioMetrics::from_rates(&calculation.level_order, &scenario.rate_inputs);

        scenario.level_order = calculation.level_order;
        scenario.calculated_grades = Some(calculation.grades);
        scenario.vertical_avg = metrics.vertical_avg;
        scenario.horizontal_avg = metrics.horizontal_avg;
        scenario.calculated_at = Some(now);

        tx.append_history(history_entry(
            &scenario,
            HistoryAction::Calculated,
            None,
            json!({
                "levels": scenario.level_order.len(),
                "vertical_avg": metrics.vertical_avg,
                "horizontal_avg": metrics.horizontal_avg,
            }),
            actor,
            now,
        ));
        tx.put(scenario.clone());
        Ok(scenario)
    }

    fn apply_in(
        tx: &mut Transaction,
        scenario_id: Uuid,
        levels: &[HierarchyLevel],
        actor: &str,
        now: DateTime<Utc>,
        checkpoint: &mut dyn FnMut(ApplyStep) -> EngineResult<()>,
    ) -> EngineResult<(Scenario, Option<Uuid>)> {
        let mut scenario = tx.scenario(scenario_id)?.clone();
        if !scenario.is_draft() {
            return Err(invalid_state(
                &scenario,
                format!(
                    "only DRAFT scenarios can be applied (status is {})",
                    scenario.status.label()
                ),
            ));
        }
        let grades: GradeTable = match &scenario.calculated_grades {
            Some(grades) if !grades.is_empty() => grades.clone(),
            _ => return Err(invalid_state(&scenario, "scenario has not been calculated")),
        };

        // Step 2: retire the previous CURRENT scenario.
        let previous = tx.current_scenario().cloned();
        let changes = match &previous {
            Some(previous) => json!({
                "replaced_scenario_id": previous.id,
                "replaced_scenario_name": previous.name,
                "note": "replaced the previous current scenario",
            }),
            None => json!({ "note": "first application for this grading system" }),
        };
        let previous_id = previous.as_ref().map(|p| p.id);
        if let Some(mut previous) = previous {
            previous.status = ScenarioStatus::Archived;
            tx.put(previous);
        }
        tx.append_history(history_entry(
            &scenario,
            HistoryAction::Applied,
            previous_id,
            changes,
            actor,
            now,
        ));
        checkpoint(ApplyStep::PreviousArchived)?;

        // Step 3: promote.
        scenario.status = ScenarioStatus::Current;
        scenario.applied_at = Some(now);
        scenario.applied_by = Some(actor.to_string());
        tx.put(scenario.clone());
        checkpoint(ApplyStep::MarkedCurrent)?;

        // Step 4: materialise.
        let numbers: HashMap<&str, u32> = levels.iter().map(|l| (l.name.as_str(), l.level)).collect();
        let rows = scenario
            .level_order
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                let row = grades.get(name)?;
                Some(SalaryGrade {
                    grading_system_id: scenario.grading_system_id.clone(),
                    level_name: name.clone(),
                    level: numbers
                        .get(name.as_str())
                        .copied()
                        .unwrap_or(index as u32 + 1),
                    grades: *row,
                    source_scenario_id: scenario.id,
                    updated_at: now,
                })
            })
            .collect();
        tx.replace_grades(rows);
        checkpoint(ApplyStep::GradesReplaced)?;

        Ok((scenario, previous_id))
    }

    fn unique_copy_name(tx: &Transaction, name: &str) -> String {
        let taken = |candidate: &str| tx.scenarios().any(|s| s.name == candidate);
        let mut candidate = format!("{} (Copy)", name);
        let mut counter = 2;
        while taken(&candidate) {
            candidate = format!("{} (Copy {})", name, counter);
            counter += 1;
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::StaticHierarchy;
    use crate::models::{IntervalRates, LevelRates, Percentage};
    use std::sync::Barrier;
    use std::thread;

    fn pct(value: i64) -> Percentage {
        Percentage::new(Decimal::from(value)).unwrap()
    }

    fn levels() -> Vec<HierarchyLevel> {
        vec![
            HierarchyLevel::new("L1", 1),
            HierarchyLevel::new("L2", 2),
            HierarchyLevel::new("L3", 3),
        ]
    }

    fn repository() -> ScenarioRepository {
        ScenarioRepository::new(Arc::new(StaticHierarchy::new(levels())))
    }

    fn rates() -> RateMap {
        ["L1", "L2", "L3"]
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    LevelRates {
                        vertical: Some(pct(10)),
                        horizontal_intervals: IntervalRates::uniform(pct(5)),
                    },
                )
            })
            .collect()
    }

    fn new_scenario(name: &str) -> NewScenario {
        NewScenario {
            grading_system_id: "standard".to_string(),
            name: name.to_string(),
            description: "test scenario".to_string(),
            base_value: Decimal::from(1000),
            level_order: vec![],
            rate_inputs: rates(),
            global_horizontal_intervals: None,
        }
    }

    fn actions(repo: &ScenarioRepository, id: Uuid) -> Vec<HistoryAction> {
        repo.history(id).unwrap().into_iter().map(|h| h.action).collect()
    }

    fn current_ids(repo: &ScenarioRepository) -> Vec<Uuid> {
        repo.store()
            .scenarios("standard")
            .unwrap()
            .into_iter()
            .filter(|s| s.status == ScenarioStatus::Current)
            .map(|s| s.id)
            .collect()
    }

    #[test]
    fn test_create_records_history() {
        let repo = repository();
        let scenario = repo.create(new_scenario("Plan A"), "alice").unwrap();

        assert_eq!(scenario.status, ScenarioStatus::Draft);
        assert!(scenario.calculated_grades.is_none());
        assert_eq!(scenario.created_by, "alice");
        assert_eq!(actions(&repo, scenario.id), vec![HistoryAction::Created]);
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let repo = repository();
        let mut zero = new_scenario("Zero");
        zero.base_value = Decimal::ZERO;
        assert!(matches!(
            repo.create(zero, "alice"),
            Err(EngineError::InvalidInput { field, .. }) if field == "base_value"
        ));
        assert!(matches!(
            repo.create(new_scenario("   "), "alice"),
            Err(EngineError::InvalidInput { field, .. }) if field == "name"
        ));
        assert!(repo.store().scenarios("standard").unwrap().is_empty());
    }

    #[test]
    fn test_calculate_stores_grades_and_averages() {
        let repo = repository();
        let draft = repo.create(new_scenario("Plan A"), "alice").unwrap();
        let scenario = repo.calculate(draft.id, "bob").unwrap();

        let grades = scenario.calculated_grades.as_ref().unwrap();
        assert_eq!(grades["L3"].ld, Decimal::from(1000));
        assert_eq!(grades["L1"].ud, Decimal::from(1471));
        assert_eq!(scenario.level_order, vec!["L1", "L2", "L3"]);
        assert_eq!(scenario.vertical_avg, Decimal::new(10, 2));
        assert_eq!(scenario.horizontal_avg, Decimal::new(5, 2));
        assert!(scenario.calculated_at.is_some());
        assert_eq!(
            actions(&repo, draft.id),
            vec![HistoryAction::Created, HistoryAction::Calculated]
        );
    }

    #[test]
    fn test_recalculation_is_idempotent() {
        let repo = repository();
        let draft = repo.create(new_scenario("Plan A"), "alice").unwrap();
        let first = repo.calculate(draft.id, "alice").unwrap();
        let second = repo.calculate(draft.id, "alice").unwrap();

        assert_eq!(first.calculated_grades, second.calculated_grades);
        assert_eq!(first.vertical_avg, second.vertical_avg);
        assert_eq!(actions(&repo, draft.id).len(), 3);
    }

    #[test]
    fn test_save_draft_is_calculated() {
        let repo = repository();
        let scenario = repo.save_draft(new_scenario("Saved"), "alice").unwrap();

        assert!(scenario.is_calculated());
        assert_eq!(repo.get(scenario.id).unwrap(), scenario);
        assert_eq!(
            actions(&repo, scenario.id),
            vec![HistoryAction::Created, HistoryAction::Calculated]
        );
    }

    #[test]
    fn test_apply_requires_calculation() {
        let repo = repository();
        let draft = repo.create(new_scenario("Plan A"), "alice").unwrap();
        assert!(matches!(
            repo.apply(draft.id, "alice"),
            Err(EngineError::InvalidState { .. })
        ));
        assert_eq!(repo.get(draft.id).unwrap().status, ScenarioStatus::Draft);
    }

    #[test]
    fn test_first_apply_materialises_grades() {
        let repo = repository();
        let draft = repo.save_draft(new_scenario("Plan A"), "alice").unwrap();
        let applied = repo.apply(draft.id, "carol").unwrap();

        assert_eq!(applied.status, ScenarioStatus::Current);
        assert_eq!(applied.applied_by.as_deref(), Some("carol"));
        assert!(applied.applied_at.is_some());

        let grades = repo.materialized_grades("standard").unwrap();
        assert_eq!(grades.len(), 3);
        let l2 = grades.iter().find(|g| g.level_name == "L2").unwrap();
        assert_eq!(l2.level, 2);
        assert_eq!(l2.grades.m, Decimal::from(1213));
        assert!(grades.iter().all(|g| g.source_scenario_id == draft.id));

        let applied_entry = repo.history(draft.id).unwrap().pop().unwrap();
        assert_eq!(applied_entry.action, HistoryAction::Applied);
        assert_eq!(applied_entry.previous_current_scenario_id, None);
    }

    #[test]
    fn test_apply_replaces_previous_current() {
        let repo = repository();
        let first = repo.save_draft(new_scenario("First"), "alice").unwrap();
        repo.apply(first.id, "alice").unwrap();

        let mut second_input = new_scenario("Second");
        second_input.base_value = Decimal::from(2000);
        let second = repo.save_draft(second_input, "alice").unwrap();
        repo.apply(second.id, "bob").unwrap();

        assert_eq!(repo.get(first.id).unwrap().status, ScenarioStatus::Archived);
        assert_eq!(current_ids(&repo), vec![second.id]);

        let entry = repo.history(second.id).unwrap().pop().unwrap();
        assert_eq!(entry.previous_current_scenario_id, Some(first.id));

        let grades = repo.materialized_grades("standard").unwrap();
        assert!(grades.iter().all(|g| g.source_scenario_id == second.id));
        let l3 = grades.iter().find(|g| g.level_name == "L3").unwrap();
        assert_eq!(l3.grades.ld, Decimal::from(2000));
    }

    #[test]
    fn test_apply_is_refused_for_non_draft() {
        let repo = repository();
        let scenario = repo.save_draft(new_scenario("Plan A"), "alice").unwrap();
        repo.apply(scenario.id, "alice").unwrap();

        assert!(matches!(
            repo.apply(scenario.id, "alice"),
            Err(EngineError::InvalidState { .. })
        ));
        assert!(matches!(
            repo.calculate(scenario.id, "alice"),
            Err(EngineError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_failed_apply_changes_nothing() {
        let repo = repository();
        let first = repo.save_draft(new_scenario("First"), "alice").unwrap();
        repo.apply(first.id, "alice").unwrap();
        let second = repo.save_draft(new_scenario("Second"), "alice").unwrap();
        let grades_before = repo.materialized_grades("standard").unwrap();
        let history_before = repo.system_history("standard").unwrap().len();

        let result = repo.apply_with_checkpoint(second.id, "alice", &mut |step| {
            if step == ApplyStep::PreviousArchived {
                Err(EngineError::Persistence {
                    message: "injected failure".to_string(),
                })
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(EngineError::Persistence { .. })));
        assert_eq!(repo.get(first.id).unwrap().status, ScenarioStatus::Current);
        assert_eq!(repo.get(second.id).unwrap().status, ScenarioStatus::Draft);
        assert_eq!(repo.materialized_grades("standard").unwrap(), grades_before);
        assert_eq!(repo.system_history("standard").unwrap().len(), history_before);
    }

    #[test]
    fn test_failure_after_grades_replaced_changes_nothing() {
        let repo = repository();
        let draft = repo.save_draft(new_scenario("Plan A"), "alice").unwrap();

        let result = repo.apply_with_checkpoint(draft.id, "alice", &mut |step| match step {
            ApplyStep::GradesReplaced => Err(EngineError::Persistence {
                message: "injected failure".to_string(),
            }),
            _ => Ok(()),
        });

        assert!(result.is_err());
        assert!(repo.materialized_grades("standard").unwrap().is_empty());
        assert!(current_ids(&repo).is_empty());
    }

    #[test]
    fn test_interleaved_apply_conflicts() {
        let repo = repository();
        let a = repo.save_draft(new_scenario("A"), "alice").unwrap();
        let b = repo.save_draft(new_scenario("B"), "bob").unwrap();
        let now = Utc::now();

        let mut tx_a = repo.store().begin("standard").unwrap();
        let mut tx_b = repo.store().begin("standard").unwrap();
        ScenarioRepository::apply_in(&mut tx_a, a.id, &levels(), "alice", now, &mut |_| Ok(()))
            .unwrap();
        ScenarioRepository::apply_in(&mut tx_b, b.id, &levels(), "bob", now, &mut |_| Ok(()))
            .unwrap();

        repo.store().commit(tx_a).unwrap();
        assert!(matches!(
            repo.store().commit(tx_b),
            Err(EngineError::Conflict { .. })
        ));
        assert_eq!(current_ids(&repo), vec![a.id]);
    }

    #[test]
    fn test_concurrent_applies_leave_one_current() {
        let repo = Arc::new(repository());
        let ids: Vec<Uuid> = (0..4)
            .map(|i| repo.save_draft(new_scenario(&format!("S{}", i)), "alice").unwrap().id)
            .collect();
        let barrier = Arc::new(Barrier::new(ids.len()));

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let repo = Arc::clone(&repo);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    repo.apply(id, "worker")
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().any(|r| r.is_ok()));
        for result in &results {
            if let Err(err) = result {
                assert!(matches!(err, EngineError::Conflict { .. }), "{:?}", err);
            }
        }
        assert_eq!(current_ids(&repo).len(), 1);
    }

    #[test]
    fn test_archive_transitions() {
        let repo = repository();
        let draft = repo.create(new_scenario("Draft"), "alice").unwrap();
        let archived = repo.archive(draft.id, "alice").unwrap();
        assert_eq!(archived.status, ScenarioStatus::Archived);
        assert!(matches!(
            repo.archive(draft.id, "alice"),
            Err(EngineError::InvalidState { .. })
        ));
        assert!(matches!(
            repo.calculate(draft.id, "alice"),
            Err(EngineError::InvalidState { .. })
        ));
        assert_eq!(
            actions(&repo, draft.id),
            vec![HistoryAction::Created, HistoryAction::Archived]
        );
    }

    #[test]
    fn test_archive_current_keeps_grades() {
        let repo = repository();
        let scenario = repo.save_draft(new_scenario("Live"), "alice").unwrap();
        repo.apply(scenario.id, "alice").unwrap();
        repo.archive(scenario.id, "alice").unwrap();

        assert!(repo.current_scenario("standard").unwrap().is_none());
        assert_eq!(repo.materialized_grades("standard").unwrap().len(), 3);

        let next = repo.save_draft(new_scenario("Next"), "alice").unwrap();
        let applied = repo.apply(next.id, "alice").unwrap();
        assert_eq!(applied.status, ScenarioStatus::Current);
        let entry = repo.history(next.id).unwrap().pop().unwrap();
        assert_eq!(entry.previous_current_scenario_id, None);
    }

    #[test]
    fn test_duplicate_naming() {
        let repo = repository();
        let source = repo.save_draft(new_scenario("Plan"), "alice").unwrap();

        let first = repo.duplicate(source.id, "bob").unwrap();
        let second = repo.duplicate(source.id, "bob").unwrap();
        assert_eq!(first.name, "Plan (Copy)");
        assert_eq!(second.name, "Plan (Copy 2)");
        assert_eq!(first.status, ScenarioStatus::Draft);
        assert!(first.calculated_grades.is_none());
        assert_eq!(first.rate_inputs, source.rate_inputs);
        assert_eq!(first.created_by, "bob");

        let created = &repo.history(first.id).unwrap()[0];
        assert_eq!(created.changes_made["duplicated_from"], json!(source.id));
    }

    #[test]
    fn test_current_structure_blanks_missing_levels() {
        let repo = repository();
        let structure = repo.current_structure("standard").unwrap();
        assert_eq!(structure.rows.len(), 3);
        assert_eq!(structure.source_scenario_id, None);
        assert!(structure.rows.iter().all(|r| r.grades == DisplayGradeRow::default()));

        let scenario = repo.save_draft(new_scenario("Live"), "alice").unwrap();
        repo.apply(scenario.id, "alice").unwrap();
        let structure = repo.current_structure("standard").unwrap();
        assert_eq!(structure.source_scenario_id, Some(scenario.id));
        assert_eq!(structure.rows[0].level_name, "L1");
        assert_eq!(structure.rows[2].grades.ld, Some(Decimal::from(1000)));
    }

    #[test]
    fn test_current_structure_without_levels() {
        let repo = ScenarioRepository::new(Arc::new(StaticHierarchy::default()));
        assert!(matches!(
            repo.current_structure("standard"),
            Err(EngineError::Configuration { .. })
        ));
    }

    /// Hierarchy that can be emptied mid-test, as when every level is deactivated.
    struct SwitchableHierarchy {
        levels: Vec<HierarchyLevel>,
        emptied: std::sync::atomic::AtomicBool,
    }

    impl HierarchyProvider for SwitchableHierarchy {
        fn list_active_levels(&self) -> EngineResult<Vec<HierarchyLevel>> {
            if self.emptied.load(std::sync::atomic::Ordering::SeqCst) {
                StaticHierarchy::default().list_active_levels()
            } else {
                StaticHierarchy::new(self.levels.clone()).list_active_levels()
            }
        }
    }

    #[test]
    fn test_apply_without_levels_is_configuration_error() {
        let hierarchy = Arc::new(SwitchableHierarchy {
            levels: levels(),
            emptied: std::sync::atomic::AtomicBool::new(false),
        });
        let repo = ScenarioRepository::new(hierarchy.clone());
        let scenario = repo.save_draft(new_scenario("Plan"), "alice").unwrap();

        hierarchy
            .emptied
            .store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(matches!(
            repo.apply(scenario.id, "alice"),
            Err(EngineError::Configuration { .. })
        ));
        assert_eq!(repo.get(scenario.id).unwrap().status, ScenarioStatus::Draft);
        assert!(repo.materialized_grades("standard").unwrap().is_empty());
    }

    #[test]
    fn test_comparison_overflow_is_invalid_input() {
        let repo = repository();
        let live = repo.save_draft(new_scenario("Live"), "alice").unwrap();
        repo.apply(live.id, "alice").unwrap();

        let mut huge = new_scenario("Huge");
        huge.base_value = Decimal::from_str_exact("30000000000000000000000000000").unwrap();
        huge.rate_inputs = RateMap::new();
        let huge = repo.save_draft(huge, "alice").unwrap();

        assert!(matches!(
            repo.comparison(huge.id),
            Err(EngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_comparison_against_current() {
        let repo = repository();
        let live = repo.save_draft(new_scenario("Live"), "alice").unwrap();
        repo.apply(live.id, "alice").unwrap();

        let mut raise = new_scenario("Raise");
        raise.base_value = Decimal::from(1100);
        let raise = repo.save_draft(raise, "alice").unwrap();
        let comparison = repo.comparison(raise.id).unwrap();
        assert_eq!(comparison.levels.len(), 3);
        assert!(comparison.max_median_increase > Decimal::ZERO);

        let uncalculated = repo.create(new_scenario("Empty"), "alice").unwrap();
        assert!(matches!(
            repo.comparison(uncalculated.id),
            Err(EngineError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_unknown_scenario() {
        let repo = repository();
        let id = Uuid::new_v4();
        assert!(matches!(repo.get(id), Err(EngineError::ScenarioNotFound { .. })));
        assert!(matches!(repo.apply(id, "a"), Err(EngineError::ScenarioNotFound { .. })));
        assert!(matches!(repo.history(id), Err(EngineError::ScenarioNotFound { .. })));
    }
}
