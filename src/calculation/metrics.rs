//! Scenario metrics and comparison against the current structure.
//!
//! Averages are expressed as fractions (10% is `0.1`) and stored to
//! [`METRIC_SCALE`] decimal places.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{GradeTable, RateMap, SalaryGrade, Scenario};

/// Decimal places kept for averages and scores.
pub const METRIC_SCALE: u32 = 6;

/// Median increase (percent) above which a scenario is high risk.
pub const HIGH_RISK_THRESHOLD: Decimal = Decimal::from_parts(30, 0, 0, false, 0);

/// Median increase (percent) above which a scenario is medium risk.
pub const MEDIUM_RISK_THRESHOLD: Decimal = Decimal::from_parts(15, 0, 0, false, 0);

/// Upper bound of the competitiveness score.
const COMPETITIVENESS_CAP: Decimal = Decimal::ONE_HUNDRED;

const COMPETITIVENESS_FACTOR: Decimal = Decimal::from_parts(200, 0, 0, false, 0);

/// Aggregate growth statistics of a rate map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    /// Mean vertical rate as a fraction.
    #[serde(with = "rust_decimal::serde::float")]
    pub vertical_avg: Decimal,
    /// Mean horizontal rate as a fraction.
    #[serde(with = "rust_decimal::serde::float")]
    pub horizontal_avg: Decimal,
    /// Balance between vertical and horizontal growth.
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_score: Decimal,
    /// Capped competitiveness percentage.
    #[serde(with = "rust_decimal::serde::float")]
    pub competitiveness: Decimal,
}

impl ScenarioMetrics {
    /// Computes all metrics for a rate map calculated over `level_order`.
    pub fn from_rates(level_order: &[String], rates: &RateMap) -> Self {
        let vertical_avg = vertical_average(level_order, rates);
        let horizontal_avg = horizontal_average(rates);
        Self {
            vertical_avg,
            horizontal_avg,
            balance_score: balance_score(vertical_avg, horizontal_avg),
            competitiveness: competitiveness(vertical_avg, horizontal_avg),
        }
    }
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = values.iter().sum();
    (total / Decimal::from(values.len())).round_dp(METRIC_SCALE)
}

/// Mean vertical rate (as a fraction) over every level except the base level.
///
/// `level_order` lists levels highest authority first, so the base level is the
/// last entry. Levels whose vertical rate is unset or an explicit zero are left
/// out of the mean. Returns zero when nothing qualifies.
pub fn vertical_average(level_order: &[String], rates: &RateMap) -> Decimal {
    let non_base = match level_order.split_last() {
        Some((_, rest)) => rest,
        None => return Decimal::ZERO,
    };

    let values: Vec<Decimal> = non_base
        .iter()
        .filter_map(|name| rates.get(name)?.vertical)
        .filter(|rate| !rate.is_zero())
        .map(|rate| rate.as_fraction())
        .collect();

    mean(&values)
}

/// Mean of every supplied horizontal interval rate (as a fraction), zeros included.
pub fn horizontal_average(rates: &RateMap) -> Decimal {
    let values: Vec<Decimal> = rates
        .values()
        .flat_map(|level| level.horizontal_intervals.present())
        .map(|rate| rate.as_fraction())
        .collect();

    mean(&values)
}

/// `(v + h) / (1 + |v - h|)`; equal averages score their sum, imbalance lowers it.
///
/// # Examples
///
/// ```
/// use salary_grading::calculation::balance_score;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let v = Decimal::from_str("0.1").unwrap();
/// let h = Decimal::from_str("0.05").unwrap();
/// // 0.15 / 1.05
/// assert_eq!(balance_score(v, h), Decimal::from_str("0.142857").unwrap());
/// ```
pub fn balance_score(vertical_avg: Decimal, horizontal_avg: Decimal) -> Decimal {
    let spread = (vertical_avg - horizontal_avg).abs();
    ((vertical_avg + horizontal_avg) / (Decimal::ONE + spread)).round_dp(METRIC_SCALE)
}

/// `min((v + h) * 200, 100)`.
pub fn competitiveness(vertical_avg: Decimal, horizontal_avg: Decimal) -> Decimal {
    ((vertical_avg + horizontal_avg) * COMPETITIVENESS_FACTOR)
        .min(COMPETITIVENESS_CAP)
        .round_dp(2)
}

/// Qualitative risk of moving from the current structure to a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Largest median increase at most 15%.
    Low,
    /// Largest median increase above 15% and at most 30%.
    Medium,
    /// Largest median increase above 30%.
    High,
}

/// Classifies the largest median increase (in percent).
pub fn risk_level(max_increase: Decimal) -> RiskLevel {
    if max_increase > HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if max_increase > MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Sum of every level's median in the scenario.
///
/// This is an absolute total, not a delta against the current structure.
/// Fails with `InvalidInput` when the total exceeds the decimal range.
pub fn budget_impact(grades: &GradeTable) -> EngineResult<Decimal> {
    grades
        .values()
        .try_fold(Decimal::ZERO, |total, row| total.checked_add(row.m))
        .ok_or_else(|| overflow("budget impact"))
}

fn overflow(context: &str) -> EngineError {
    EngineError::InvalidInput {
        field: "base_value".to_string(),
        message: format!("{} overflowed the decimal range", context),
    }
}

/// Percentage change from `current` to `proposed`, unrounded.
fn median_change(proposed: Decimal, current: Decimal, level: &str) -> EngineResult<Decimal> {
    proposed
        .checked_sub(current)
        .and_then(|delta| delta.checked_div(current))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| overflow(&format!("median change of '{}'", level)))
}

/// Median movement of one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelComparison {
    /// The level name.
    pub level_name: String,
    /// Median proposed by the scenario.
    #[serde(with = "rust_decimal::serde::float")]
    pub scenario_median: Decimal,
    /// Median of the current structure, if the level has one.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub current_median: Option<Decimal>,
    /// Percentage change of the median, if a non-zero current median exists.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub change_pct: Option<Decimal>,
}

/// A scenario measured against the current structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    /// Growth metrics of the scenario's rates.
    #[serde(flatten)]
    pub metrics: ScenarioMetrics,
    /// Sum of scenario medians.
    #[serde(with = "rust_decimal::serde::float")]
    pub budget_impact: Decimal,
    /// Largest median increase in percent; zero when nothing is comparable.
    #[serde(with = "rust_decimal::serde::float")]
    pub max_median_increase: Decimal,
    /// Risk classification of `max_median_increase`.
    pub risk_level: RiskLevel,
    /// Per-level median movement, in the scenario's level order.
    pub levels: Vec<LevelComparison>,
}

/// Compares a calculated scenario with the materialised current grades.
///
/// The risk level is classified on the unrounded largest increase; only the
/// reported percentages are rounded to two places.
pub fn compare(scenario: &Scenario, current: &[SalaryGrade]) -> EngineResult<ScenarioComparison> {
    let current_medians: HashMap<&str, Decimal> = current
        .iter()
        .map(|grade| (grade.level_name.as_str(), grade.grades.m))
        .collect();
    let empty = GradeTable::new();
    let grades = scenario.calculated_grades.as_ref().unwrap_or(&empty);

    let mut levels = Vec::with_capacity(scenario.level_order.len());
    let mut max_change: Option<Decimal> = None;
    for name in &scenario.level_order {
        let Some(row) = grades.get(name) else {
            continue;
        };
        let current_median = current_medians.get(name.as_str()).copied();
        let change = match current_median.filter(|m| !m.is_zero()) {
            Some(m) => Some(median_change(row.m, m, name)?),
            None => None,
        };
        if let Some(change) = change {
            max_change = Some(max_change.map_or(change, |max| max.max(change)));
        }
        levels.push(LevelComparison {
            level_name: name.clone(),
            scenario_median: row.m,
            current_median,
            change_pct: change.map(|c| c.round_dp(2)),
        });
    }

    let max_change = max_change.unwrap_or(Decimal::ZERO);

    Ok(ScenarioComparison {
        metrics: ScenarioMetrics::from_rates(&scenario.level_order, &scenario.rate_inputs),
        budget_impact: budget_impact(grades)?,
        max_median_increase: max_change.round_dp(2),
        risk_level: risk_level(max_change),
        levels,
    })
}
