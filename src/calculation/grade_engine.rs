//! Grade table derivation.
//!
//! Starting from a base value at the lowest-authority level, the engine walks
//! the hierarchy upward. Within each level the four horizontal intervals are
//! compounded from the lower decile to produce the five grade points; between
//! levels the lower decile is stepped up by the vertical rate stored on the
//! level being left (the lower one).

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::hierarchy::active_levels_or_err;
use crate::models::{
    GradeRow, GradeTable, HierarchyLevel, IntervalKey, IntervalRates, Percentage, RateMap,
};

/// Rounding applied to every stored grade point: nearest integer, ties away from zero.
pub const GRADE_ROUNDING: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// The result of a grade calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeCalculation {
    /// Level names, highest authority first. The last entry is the base level.
    pub level_order: Vec<String>,
    /// Rounded grade rows keyed by level name.
    pub grades: GradeTable,
}

impl GradeCalculation {
    /// Iterates over the rows in hierarchy order, highest authority first.
    pub fn ordered_rows(&self) -> impl Iterator<Item = (&str, &GradeRow)> + '_ {
        self.level_order
            .iter()
            .filter_map(|name| self.grades.get(name).map(|row| (name.as_str(), row)))
    }
}

/// Rounds a grade point for storage.
///
/// # Examples
///
/// ```
/// use salary_grading::calculation::round_grade;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// assert_eq!(round_grade(Decimal::from_str("1102.5").unwrap()), Decimal::from(1103));
/// assert_eq!(round_grade(Decimal::from_str("1102.49").unwrap()), Decimal::from(1102));
/// ```
pub fn round_grade(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, GRADE_ROUNDING)
}

/// Derives the grade table for every active level.
///
/// # Arguments
///
/// * `base_value` - The lower decile of the base (highest level number) position
/// * `levels` - The hierarchy; inactive levels are ignored and order is not required
/// * `rates` - Rate inputs keyed by level name; missing levels and unset rates count as 0%
///
/// # Returns
///
/// Returns the rounded grade table, or an error if:
/// - `base_value` is not greater than zero (`InvalidInput`)
/// - no active level exists (`Configuration`)
/// - the compounded values exceed the decimal range (`InvalidInput`)
///
/// # Examples
///
/// ```
/// use salary_grading::calculation::calculate_grades;
/// use salary_grading::models::{HierarchyLevel, RateMap};
/// use rust_decimal::Decimal;
///
/// let levels = vec![HierarchyLevel::new("Lead", 1), HierarchyLevel::new("Staff", 2)];
/// let result = calculate_grades(Decimal::from(1000), &levels, &RateMap::new()).unwrap();
///
/// assert_eq!(result.level_order, vec!["Lead".to_string(), "Staff".to_string()]);
/// assert_eq!(result.grades["Staff"].ld, Decimal::from(1000));
/// assert_eq!(result.grades["Lead"].ud, Decimal::from(1000));
/// ```
pub fn calculate_grades(
    base_value: Decimal,
    levels: &[HierarchyLevel],
    rates: &RateMap,
) -> EngineResult<GradeCalculation> {
    if base_value <= Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "base_value".to_string(),
            message: format!("must be greater than 0, got {}", base_value),
        });
    }

    let ordered = active_levels_or_err(levels)?;
    let mut grades = GradeTable::new();
    let mut current_ld = base_value;

    for (index, level) in ordered.iter().enumerate().rev() {
        let level_rates = rates.get(&level.name).copied().unwrap_or_default();

        let row = compound_level(current_ld, &level_rates.horizontal_intervals)?;
        debug!(
            level = %level.name,
            level_number = level.level,
            ld = %row.ld,
            median = %row.m,
            ud = %row.ud,
            "Calculated grade row"
        );
        grades.insert(level.name.clone(), row);

        if index > 0 {
            let vertical = level_rates.vertical.unwrap_or(Percentage::ZERO);
            current_ld = checked_step(current_ld, vertical.multiplier(), &level.name)?;
        }
    }

    Ok(GradeCalculation {
        level_order: ordered.into_iter().map(|l| l.name).collect(),
        grades,
    })
}

/// Compounds the four intervals from `ld`, rounding only the stored points.
fn compound_level(ld: Decimal, intervals: &IntervalRates) -> EngineResult<GradeRow> {
    let mut points = [ld; 5];
    for (i, key) in IntervalKey::ALL.into_iter().enumerate() {
        let multiplier = intervals.rate_or_zero(key).multiplier();
        points[i + 1] = checked_step(points[i], multiplier, key.as_str())?;
    }

    Ok(GradeRow {
        ld: round_grade(points[0]),
        lq: round_grade(points[1]),
        m: round_grade(points[2]),
        uq: round_grade(points[3]),
        ud: round_grade(points[4]),
    })
}

fn checked_step(value: Decimal, multiplier: Decimal, context: &str) -> EngineResult<Decimal> {
    value
        .checked_mul(multiplier)
        .ok_or_else(|| EngineError::InvalidInput {
            field: "base_value".to_string(),
            message: format!("grade value overflowed while applying '{}'", context),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LevelRates;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn pct(s: &str) -> Percentage {
        Percentage::new(dec(s)).unwrap()
    }

    fn three_levels() -> Vec<HierarchyLevel> {
        vec![
            HierarchyLevel::new("L1", 1),
            HierarchyLevel::new("L2", 2),
            HierarchyLevel::new("L3", 3),
        ]
    }

    fn example_rates() -> RateMap {
        let intervals = IntervalRates::uniform(pct("5"));
        let mut rates = RateMap::new();
        rates.insert(
            "L3".to_string(),
            LevelRates {
                vertical: Some(pct("10")),
                horizontal_intervals: intervals,
            },
        );
        rates.insert(
            "L2".to_string(),
            LevelRates {
                vertical: Some(pct("10")),
                horizontal_intervals: intervals,
            },
        );
        rates.insert(
            "L1".to_string(),
            LevelRates {
                vertical: None,
                horizontal_intervals: intervals,
            },
        );
        rates
    }

    fn row(values: [i64; 5]) -> GradeRow {
        GradeRow {
            ld: Decimal::from(values[0]),
            lq: Decimal::from(values[1]),
            m: Decimal::from(values[2]),
            uq: Decimal::from(values[3]),
            ud: Decimal::from(values[4]),
        }
    }

    /// Three-level worked example with 10% vertical and 5% horizontal steps.
    #[test]
    fn test_three_level_example_values() {
        let result = calculate_grades(dec("1000"), &three_levels(), &example_rates()).unwrap();

        // L3: 1000, 1050, 1102.5, 1157.625, 1215.50625
        assert_eq!(result.grades["L3"], row([1000, 1050, 1103, 1158, 1216]));
        // L2: 1100, 1155, 1212.75, 1273.3875, 1337.056875
        assert_eq!(result.grades["L2"], row([1100, 1155, 1213, 1273, 1337]));
        // L1: 1210, 1270.5, 1334.025, 1400.72625, 1470.7625625
        assert_eq!(result.grades["L1"], row([1210, 1271, 1334, 1401, 1471]));
    }

    #[test]
    fn test_level_order_is_top_first() {
        let mut levels = three_levels();
        levels.reverse();
        let result = calculate_grades(dec("1000"), &levels, &RateMap::new()).unwrap();
        assert_eq!(result.level_order, vec!["L1", "L2", "L3"]);
        let ordered: Vec<&str> = result.ordered_rows().map(|(name, _)| name).collect();
        assert_eq!(ordered, vec!["L1", "L2", "L3"]);
    }

    /// The vertical rate of the top level is never used.
    #[test]
    fn test_top_level_vertical_is_ignored() {
        let mut rates = example_rates();
        let baseline = calculate_grades(dec("1000"), &three_levels(), &rates).unwrap();

        rates.get_mut("L1").unwrap().vertical = Some(pct("50"));
        let changed = calculate_grades(dec("1000"), &three_levels(), &rates).unwrap();

        assert_eq!(baseline.grades, changed.grades);
    }

    /// The vertical rate linking L3 to L2 is read from L3, not L2.
    #[test]
    fn test_vertical_rate_is_attributed_to_lower_level() {
        let mut rates = RateMap::new();
        rates.insert(
            "L3".to_string(),
            LevelRates {
                vertical: Some(pct("20")),
                ..LevelRates::default()
            },
        );
        let result = calculate_grades(dec("1000"), &three_levels(), &rates).unwrap();

        assert_eq!(result.grades["L2"].ld, dec("1200"));
        // L2 carries no vertical rate, so L1 starts where L2 does.
        assert_eq!(result.grades["L1"].ld, dec("1200"));
    }

    #[test]
    fn test_missing_levels_use_zero_rates() {
        let result = calculate_grades(dec("2500"), &three_levels(), &RateMap::new()).unwrap();
        for level in ["L1", "L2", "L3"] {
            assert_eq!(result.grades[level], row([2500, 2500, 2500, 2500, 2500]));
        }
    }

    #[test]
    fn test_partial_intervals_default_to_zero() {
        let mut intervals = IntervalRates::default();
        intervals.set(IntervalKey::LqToM, Some(pct("10")));
        let mut rates = RateMap::new();
        rates.insert(
            "L3".to_string(),
            LevelRates {
                vertical: None,
                horizontal_intervals: intervals,
            },
        );
        let result = calculate_grades(dec("1000"), &three_levels(), &rates).unwrap();
        assert_eq!(result.grades["L3"], row([1000, 1000, 1100, 1100, 1100]));
    }

    #[test]
    fn test_unknown_rate_keys_are_ignored() {
        let mut rates = example_rates();
        rates.insert("Ghost".to_string(), LevelRates::default());
        let result = calculate_grades(dec("1000"), &three_levels(), &rates).unwrap();
        assert_eq!(result.grades.len(), 3);
        assert!(!result.grades.contains_key("Ghost"));
    }

    #[test]
    fn test_inactive_levels_are_skipped() {
        let mut levels = three_levels();
        levels[2].active = false;
        let result = calculate_grades(dec("1000"), &levels, &example_rates()).unwrap();
        // L2 becomes the base level.
        assert_eq!(result.grades["L2"].ld, dec("1000"));
        assert!(!result.grades.contains_key("L3"));
    }

    #[test]
    fn test_zero_base_value_is_invalid_input() {
        let result = calculate_grades(Decimal::ZERO, &three_levels(), &RateMap::new());
        match result {
            Err(EngineError::InvalidInput { field, .. }) => assert_eq!(field, "base_value"),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_base_value_is_invalid_input() {
        let result = calculate_grades(dec("-5"), &three_levels(), &RateMap::new());
        assert!(matches!(result, Err(EngineError::InvalidInput { .. })));
    }

    #[test]
    fn test_no_levels_is_configuration_error() {
        let result = calculate_grades(dec("1000"), &[], &RateMap::new());
        assert!(matches!(result, Err(EngineError::Configuration { .. })));
    }

    #[test]
    fn test_overflow_is_reported_not_panicking() {
        let levels: Vec<HierarchyLevel> = (1..=20)
            .map(|n| HierarchyLevel::new(format!("L{}", n), n))
            .collect();
        let rates: RateMap = levels
            .iter()
            .map(|l| {
                (
                    l.name.clone(),
                    LevelRates {
                        vertical: Some(pct("100")),
                        horizontal_intervals: IntervalRates::uniform(pct("100")),
                    },
                )
            })
            .collect();
        let result = calculate_grades(dec("10000000000000000000000000"), &levels, &rates);
        assert!(matches!(result, Err(EngineError::InvalidInput { .. })));
    }

    #[test]
    fn test_recalculation_is_deterministic() {
        let first = calculate_grades(dec("1234.56"), &three_levels(), &example_rates()).unwrap();
        let second = calculate_grades(dec("1234.56"), &three_levels(), &example_rates()).unwrap();
        assert_eq!(first, second);
    }

    fn rate_strategy() -> impl Strategy<Value = Option<Percentage>> {
        prop::option::of((0u32..=3000).prop_map(|hundredths| {
            Percentage::new(Decimal::new(hundredths as i64, 2)).unwrap()
        }))
    }

    fn level_rates_strategy() -> impl Strategy<Value = LevelRates> {
        (rate_strategy(), prop::array::uniform4(rate_strategy())).prop_map(
            |(vertical, [a, b, c, d])| LevelRates {
                vertical,
                horizontal_intervals: IntervalRates {
                    ld_to_lq: a,
                    lq_to_m: b,
                    m_to_uq: c,
                    uq_to_ud: d,
                },
            },
        )
    }

    fn rate_map_strategy() -> impl Strategy<Value = RateMap> {
        prop::collection::vec(level_rates_strategy(), 3).prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, rates)| (format!("L{}", i + 1), rates))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_base_level_is_anchored(base in 1u32..5_000_000, rates in rate_map_strategy()) {
            let base = Decimal::new(base as i64, 2);
            let result = calculate_grades(base, &three_levels(), &rates).unwrap();
            prop_assert_eq!(result.grades["L3"].ld, round_grade(base));
        }

        #[test]
        fn prop_rows_are_monotonic(base in 1u32..5_000_000, rates in rate_map_strategy()) {
            let base = Decimal::new(base as i64, 2);
            let result = calculate_grades(base, &three_levels(), &rates).unwrap();
            for row in result.grades.values() {
                prop_assert!(row.is_monotonic(), "row not monotonic: {:?}", row);
            }
        }

        /// k*round(x) is within k/2 of k*x, and round(k*x) within 1/2 plus precision noise.
        #[test]
        fn prop_scaling_base_scales_table(
            base in 100u32..1_000_000,
            k in 1u32..10,
            rates in rate_map_strategy(),
        ) {
            let base = Decimal::from(base);
            let k = Decimal::from(k);
            let unit = calculate_grades(base, &three_levels(), &rates).unwrap();
            let scaled = calculate_grades(base * k, &three_levels(), &rates).unwrap();
            let tolerance = k / Decimal::TWO + Decimal::ONE;

            for (name, row) in &unit.grades {
                let scaled_row = &scaled.grades[name];
                for (a, b) in row.points().iter().zip(scaled_row.points().iter()) {
                    prop_assert!((*a * k - *b).abs() <= tolerance);
                }
            }
        }
    }
}
