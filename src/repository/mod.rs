//! Scenario persistence and lifecycle.
//!
//! [`ScenarioStore`] holds scenarios, their history and the materialised grade
//! tables. [`ScenarioRepository`] layers the lifecycle rules on top: a grading
//! system has at most one CURRENT scenario, and applying a scenario either
//! completes fully or leaves nothing behind.

mod lifecycle;
mod query;
mod store;

pub use lifecycle::{ApplyStep, CurrentStructure, NewScenario, ScenarioRepository, StructureRow};
pub use query::{OrderField, Page, ScenarioOrdering, ScenarioQuery, run_query};
pub use store::{ScenarioStore, Transaction};
