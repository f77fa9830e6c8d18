//! Calculation logic for the salary grading service.
//!
//! This module contains the pure, stateless parts of the service: validation
//! of raw rate payloads, derivation of a full grade table from a base value
//! and growth rates, and the metrics used to compare scenarios with the
//! current structure.

mod grade_engine;
mod metrics;
mod validator;

pub use grade_engine::{GRADE_ROUNDING, GradeCalculation, calculate_grades, round_grade};
pub use metrics::{
    HIGH_RISK_THRESHOLD, LevelComparison, MEDIUM_RISK_THRESHOLD, METRIC_SCALE, RiskLevel,
    ScenarioComparison, ScenarioMetrics, balance_score, budget_impact, compare, competitiveness,
    horizontal_average, risk_level, vertical_average,
};
pub use validator::{
    RateCell, ValidatedInputs, parse_decimal, read_base_value, read_rate, validate,
    validate_global_intervals, validate_inputs,
};
