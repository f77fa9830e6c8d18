//! Transactional in-memory scenario storage.
//!
//! Every mutation runs in a [`Transaction`] scoped to one grading system. A
//! transaction reads a snapshot of that system, buffers its writes, and is
//! committed only if the system's revision has not moved since the snapshot
//! was taken. A stale commit fails with [`EngineError::Conflict`] and writes
//! nothing; dropping a transaction discards its writes.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{SalaryGrade, Scenario, ScenarioHistory, ScenarioStatus};

#[derive(Debug, Default)]
struct StoreState {
    scenarios: HashMap<Uuid, Scenario>,
    history: Vec<ScenarioHistory>,
    grades: HashMap<String, Vec<SalaryGrade>>,
    revisions: HashMap<String, u64>,
}

impl StoreState {
    fn revision(&self, grading_system: &str) -> u64 {
        self.revisions.get(grading_system).copied().unwrap_or(0)
    }
}

/// Buffered unit of work against one grading system.
#[derive(Debug)]
pub struct Transaction {
    grading_system: String,
    base_revision: u64,
    scenarios: HashMap<Uuid, Scenario>,
    dirty: HashSet<Uuid>,
    history: Vec<ScenarioHistory>,
    grades: Vec<SalaryGrade>,
    grades_replaced: bool,
}

impl Transaction {
    /// The grading system this transaction is scoped to.
    pub fn grading_system(&self) -> &str {
        &self.grading_system
    }

    /// The system revision the snapshot was taken at.
    pub fn base_revision(&self) -> u64 {
        self.base_revision
    }

    /// Reads a scenario of this grading system, including uncommitted writes.
    pub fn scenario(&self, id: Uuid) -> EngineResult<&Scenario> {
        self.scenarios
            .get(&id)
            .ok_or(EngineError::ScenarioNotFound { id })
    }

    /// Iterates over every scenario of this grading system.
    pub fn scenarios(&self) -> impl Iterator<Item = &Scenario> + '_ {
        self.scenarios.values()
    }

    /// The scenario currently marked CURRENT, if any.
    pub fn current_scenario(&self) -> Option<&Scenario> {
        self.scenarios
            .values()
            .find(|s| s.status == ScenarioStatus::Current)
    }

    /// Inserts or replaces a scenario.
    pub fn put(&mut self, scenario: Scenario) {
        self.dirty.insert(scenario.id);
        self.scenarios.insert(scenario.id, scenario);
    }

    /// Appends a history entry.
    pub fn append_history(&mut self, entry: ScenarioHistory) {
        self.history.push(entry);
    }

    /// The materialised grades as this transaction sees them.
    pub fn grades(&self) -> &[SalaryGrade] {
        &self.grades
    }

    /// Replaces every materialised grade of this grading system.
    pub fn replace_grades(&mut self, grades: Vec<SalaryGrade>) {
        self.grades = grades;
        self.grades_replaced = true;
    }

    fn has_writes(&self) -> bool {
        !self.dirty.is_empty() || !self.history.is_empty() || self.grades_replaced
    }
}

/// Thread-safe scenario storage with optimistic, per-grading-system concurrency control.
#[derive(Debug, Default)]
pub struct ScenarioStore {
    state: RwLock<StoreState>,
}

impl ScenarioStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> EngineResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| EngineError::Persistence {
            message: "scenario store lock poisoned".to_string(),
        })
    }

    fn write(&self) -> EngineResult<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| EngineError::Persistence {
            message: "scenario store lock poisoned".to_string(),
        })
    }

    /// Starts a transaction over a snapshot of one grading system.
    pub fn begin(&self, grading_system: &str) -> EngineResult<Transaction> {
        let state = self.read()?;
        let scenarios = state
            .scenarios
            .values()
            .filter(|s| s.grading_system_id == grading_system)
            .map(|s| (s.id, s.clone()))
            .collect();

        Ok(Transaction {
            grading_system: grading_system.to_string(),
            base_revision: state.revision(grading_system),
            scenarios,
            dirty: HashSet::new(),
            history: Vec::new(),
            grades: state.grades.get(grading_system).cloned().unwrap_or_default(),
            grades_replaced: false,
        })
    }

    /// Commits a transaction, returning the new revision of its grading system.
    ///
    /// Fails with `Conflict` when another transaction committed against the same
    /// grading system after this one began, or when the writes would leave more
    /// than one CURRENT scenario. Nothing is written on failure.
    pub fn commit(&self, tx: Transaction) -> EngineResult<u64> {
        let mut state = self.write()?;
        let revision = state.revision(&tx.grading_system);

        if !tx.has_writes() {
            return Ok(revision);
        }

        if revision != tx.base_revision {
            warn!(
                grading_system = %tx.grading_system,
                expected_revision = tx.base_revision,
                actual_revision = revision,
                "Rejected stale transaction"
            );
            return Err(EngineError::Conflict {
                grading_system: tx.grading_system,
                message: format!(
                    "modified concurrently (revision {} is now {})",
                    tx.base_revision, revision
                ),
            });
        }

        let current_count = tx
            .scenarios
            .values()
            .filter(|s| s.status == ScenarioStatus::Current)
            .count();
        if current_count > 1 {
            return Err(EngineError::Conflict {
                grading_system: tx.grading_system,
                message: format!("{} scenarios would be CURRENT", current_count),
            });
        }

        let Transaction {
            grading_system,
            mut scenarios,
            dirty,
            history,
            grades,
            grades_replaced,
            ..
        } = tx;

        for id in dirty {
            if let Some(scenario) = scenarios.remove(&id) {
                state.scenarios.insert(id, scenario);
            }
        }
        state.history.extend(history);
        if grades_replaced {
            state.grades.insert(grading_system.clone(), grades);
        }

        let next = revision + 1;
        state.revisions.insert(grading_system.clone(), next);
        debug!(grading_system = %grading_system, revision = next, "Committed transaction");
        Ok(next)
    }

    /// Reads a scenario from any grading system.
    pub fn scenario(&self, id: Uuid) -> EngineResult<Scenario> {
        self.read()?
            .scenarios
            .get(&id)
            .cloned()
            .ok_or(EngineError::ScenarioNotFound { id })
    }

    /// Reads every scenario of a grading system.
    pub fn scenarios(&self, grading_system: &str) -> EngineResult<Vec<Scenario>> {
        Ok(self
            .read()?
            .scenarios
            .values()
            .filter(|s| s.grading_system_id == grading_system)
            .cloned()
            .collect())
    }

    /// Reads the history of one scenario in the order it was written.
    pub fn history_for(&self, scenario_id: Uuid) -> EngineResult<Vec<ScenarioHistory>> {
        Ok(self
            .read()?
            .history
            .iter()
            .filter(|h| h.scenario_id == scenario_id)
            .cloned()
            .collect())
    }

    /// Reads the history of every scenario in a grading system.
    pub fn history_for_system(&self, grading_system: &str) -> EngineResult<Vec<ScenarioHistory>> {
        Ok(self
            .read()?
            .history
            .iter()
            .filter(|h| h.grading_system_id == grading_system)
            .cloned()
            .collect())
    }

    /// Reads the materialised grades of a grading system.
    pub fn grades(&self, grading_system: &str) -> EngineResult<Vec<SalaryGrade>> {
        Ok(self
            .read()?
            .grades
            .get(grading_system)
            .cloned()
            .unwrap_or_default())
    }

    /// The committed revision of a grading system (0 before any write).
    pub fn revision(&self, grading_system: &str) -> EngineResult<u64> {
        Ok(self.read()?.revision(grading_system))
    }
}
