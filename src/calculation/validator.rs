//! Rate input validation.
//!
//! Validation runs on the raw wire payload, before anything reaches the grade
//! engine. It never stops at the first problem: every invalid value is
//! reported so a client can fix them all in one round trip. Empty strings and
//! nulls mean "unset" and are never errors.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    HierarchyLevel, IntervalKey, IntervalRates, LevelRates, Percentage, RateMap, RawIntervals,
    RawRateMap,
};

/// How a single raw rate value reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCell {
    /// Null, missing, or an empty string.
    Unset,
    /// A number in `[0, 100]`.
    Valid(Percentage),
    /// Anything else: non-numeric text, out-of-range numbers, booleans, arrays, objects.
    Invalid,
}

/// Validated inputs ready for the grade engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInputs {
    /// The base value, strictly positive.
    pub base_value: Decimal,
    /// Per-level rates. When global intervals were supplied they are already
    /// copied into every level.
    pub rates: RateMap,
    /// The shared horizontal intervals, if the payload used that shape.
    pub global_horizontal_intervals: Option<IntervalRates>,
}

/// Parses a raw JSON value as a decimal, accepting numbers and numeric strings.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Classifies a raw rate value.
///
/// # Examples
///
/// ```
/// use salary_grading::calculation::{RateCell, read_rate};
/// use serde_json::json;
///
/// assert_eq!(read_rate(&json!("")), RateCell::Unset);
/// assert_eq!(read_rate(&json!(null)), RateCell::Unset);
/// assert_eq!(read_rate(&json!("abc")), RateCell::Invalid);
/// assert_eq!(read_rate(&json!(101)), RateCell::Invalid);
/// assert!(matches!(read_rate(&json!("12.5")), RateCell::Valid(_)));
/// ```
pub fn read_rate(value: &Value) -> RateCell {
    match value {
        Value::Null => RateCell::Unset,
        Value::String(text) if text.trim().is_empty() => RateCell::Unset,
        other => match parse_decimal(other).and_then(Percentage::new) {
            Some(rate) => RateCell::Valid(rate),
            None => RateCell::Invalid,
        },
    }
}

/// Parses the base value, returning `None` unless it is a number greater than zero.
pub fn read_base_value(value: &Value) -> Option<Decimal> {
    parse_decimal(value).filter(|v| *v > Decimal::ZERO)
}

/// Checks the base value and every level's rates.
///
/// Returns one message per problem; an empty list means the inputs are valid.
/// This function has no side effects.
///
/// # Examples
///
/// ```
/// use salary_grading::calculation::validate;
/// use salary_grading::models::RawRateMap;
/// use serde_json::json;
///
/// let rates: RawRateMap = serde_json::from_value(json!({"L1": {"vertical": ""}})).unwrap();
/// assert!(validate(&json!(100), &rates).is_empty());
///
/// let rates: RawRateMap = serde_json::from_value(json!({"L1": {"vertical": "abc"}})).unwrap();
/// let errors = validate(&json!(100), &rates);
/// assert_eq!(errors.len(), 1);
/// assert!(errors[0].contains("L1"));
/// ```
pub fn validate(base_value: &Value, rates: &RawRateMap) -> Vec<String> {
    let mut errors = Vec::new();

    if read_base_value(base_value).is_none() {
        errors.push(if base_value.is_null() {
            "Base value is required".to_string()
        } else {
            format!(
                "Base value must be a number greater than 0 (got {})",
                base_value
            )
        });
    }

    for (level, raw) in rates {
        if read_rate(&raw.vertical) == RateCell::Invalid {
            errors.push(format!(
                "Level '{}': vertical rate must be a number between 0 and 100 (got {})",
                level, raw.vertical
            ));
        }

        if let Some(intervals) = &raw.horizontal_intervals {
            for key in IntervalKey::ALL {
                let Some(value) = intervals.get(key.as_str()) else {
                    continue;
                };
                if read_rate(value) == RateCell::Invalid {
                    errors.push(format!(
                        "Level '{}': horizontal interval {} must be a number between 0 and 100 (got {})",
                        level, key, value
                    ));
                }
            }
        }
    }

    errors
}

/// Checks a shared set of horizontal intervals.
pub fn validate_global_intervals(intervals: &RawIntervals) -> Vec<String> {
    IntervalKey::ALL
        .into_iter()
        .filter_map(|key| {
            let value = intervals.get(key.as_str())?;
            (read_rate(value) == RateCell::Invalid).then(|| {
                format!(
                    "Global horizontal interval {} must be a number between 0 and 100 (got {})",
                    key, value
                )
            })
        })
        .collect()
}

fn convert_intervals(raw: &RawIntervals) -> IntervalRates {
    let mut intervals = IntervalRates::default();
    for key in IntervalKey::ALL {
        if let Some(RateCell::Valid(rate)) = raw.get(key.as_str()).map(read_rate) {
            intervals.set(key, Some(rate));
        }
    }
    intervals
}

/// Validates the raw payload and converts it into typed inputs.
///
/// When `global` intervals are supplied they replace the horizontal intervals of
/// every level in `levels` (levels missing from `rates` are added).
///
/// # Returns
///
/// Returns [`EngineError::Validation`] carrying every message when any check fails.
pub fn validate_inputs(
    base_value: &Value,
    rates: &RawRateMap,
    global: Option<&RawIntervals>,
    levels: &[HierarchyLevel],
) -> EngineResult<ValidatedInputs> {
    let mut errors = validate(base_value, rates);
    if let Some(global) = global {
        errors.extend(validate_global_intervals(global));
    }
    if !errors.is_empty() {
        return Err(EngineError::Validation { errors });
    }

    let base_value = read_base_value(base_value).ok_or_else(|| EngineError::Validation {
        errors: vec!["Base value is required".to_string()],
    })?;

    let mut typed: RateMap = rates
        .iter()
        .map(|(level, raw)| {
            let vertical = match read_rate(&raw.vertical) {
                RateCell::Valid(rate) => Some(rate),
                _ => None,
            };
            let horizontal_intervals = raw
                .horizontal_intervals
                .as_ref()
                .map(convert_intervals)
                .unwrap_or_default();
            (
                level.clone(),
                LevelRates {
                    vertical,
                    horizontal_intervals,
                },
            )
        })
        .collect();

    let global_horizontal_intervals = global.map(convert_intervals);
    if let Some(shared) = global_horizontal_intervals {
        for level in levels {
            typed.entry(level.name.clone()).or_default().horizontal_intervals = shared;
        }
    }

    Ok(ValidatedInputs {
        base_value,
        rates: typed,
        global_horizontal_intervals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_rates(value: Value) -> RawRateMap {
        serde_json::from_value(value).unwrap()
    }

    fn pct(n: i64) -> Percentage {
        Percentage::new(Decimal::from(n)).unwrap()
    }

    #[test]
    fn test_empty_vertical_is_not_an_error() {
        let errors = validate(&json!(100), &raw_rates(json!({"L1": {"vertical": ""}})));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_non_numeric_vertical_names_level() {
        let errors = validate(&json!(100), &raw_rates(json!({"L1": {"vertical": "abc"}})));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'L1'"));
        assert!(errors[0].contains("vertical"));
        assert!(errors[0].contains("\"abc\""));
    }

    #[test]
    fn test_null_values_are_unset() {
        let errors = validate(
            &json!(100),
            &raw_rates(json!({
                "L1": {"vertical": null, "horizontal_intervals": {"LD_to_LQ": null}}
            })),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_explicit_zero_is_valid() {
        let errors = validate(&json!(100), &raw_rates(json!({"L1": {"vertical": 0}})));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_out_of_range_values_are_reported() {
        let errors = validate(
            &json!(100),
            &raw_rates(json!({
                "L1": {"vertical": 100.5},
                "L2": {"vertical": -1}
            })),
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let errors = validate(
            &json!("2500.50"),
            &raw_rates(json!({"L1": {"vertical": " 12.5 ", "horizontal_intervals": {"LQ_to_M": "3"}}})),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_each_bad_interval_gets_its_own_error() {
        let errors = validate(
            &json!(100),
            &raw_rates(json!({
                "L1": {"horizontal_intervals": {
                    "LD_to_LQ": "x", "LQ_to_M": 5, "M_to_UQ": 200, "UQ_to_UD": true
                }}
            })),
        );
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("LD_to_LQ"));
        assert!(errors[1].contains("M_to_UQ"));
        assert!(errors[2].contains("UQ_to_UD"));
    }

    #[test]
    fn test_unknown_interval_keys_are_ignored() {
        let errors = validate(
            &json!(100),
            &raw_rates(json!({"L1": {"horizontal_intervals": {"M_to_X": "junk"}}})),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_base_value_rules() {
        let rates = RawRateMap::new();
        assert_eq!(validate(&Value::Null, &rates), vec!["Base value is required"]);
        assert_eq!(validate(&json!(0), &rates).len(), 1);
        assert_eq!(validate(&json!(-10), &rates).len(), 1);
        assert_eq!(validate(&json!("ten"), &rates).len(), 1);
        assert!(validate(&json!(0.01), &rates).is_empty());
    }

    #[test]
    fn test_errors_are_collected_not_fail_fast() {
        let errors = validate(
            &json!(0),
            &raw_rates(json!({
                "L1": {"vertical": "bad"},
                "L2": {"horizontal_intervals": {"LD_to_LQ": "bad"}}
            })),
        );
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_validate_inputs_converts_rates() {
        let inputs = validate_inputs(
            &json!(1000),
            &raw_rates(json!({
                "L2": {"vertical": "10", "horizontal_intervals": {"LD_to_LQ": 5, "LQ_to_M": ""}}
            })),
            None,
            &[],
        )
        .unwrap();

        assert_eq!(inputs.base_value, Decimal::from(1000));
        let l2 = inputs.rates["L2"];
        assert_eq!(l2.vertical, Some(pct(10)));
        assert_eq!(l2.horizontal_intervals.get(IntervalKey::LdToLq), Some(pct(5)));
        assert_eq!(l2.horizontal_intervals.get(IntervalKey::LqToM), None);
        assert!(inputs.global_horizontal_intervals.is_none());
    }

    #[test]
    fn test_validate_inputs_returns_all_errors() {
        let result = validate_inputs(
            &json!(-1),
            &raw_rates(json!({"L1": {"vertical": "abc"}})),
            None,
            &[],
        );
        match result {
            Err(EngineError::Validation { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_global_intervals_apply_to_every_level() {
        let levels = vec![HierarchyLevel::new("L1", 1), HierarchyLevel::new("L2", 2)];
        let global: RawIntervals = serde_json::from_value(json!({
            "LD_to_LQ": 4, "LQ_to_M": 4, "M_to_UQ": 4, "UQ_to_UD": 4
        }))
        .unwrap();
        let inputs = validate_inputs(
            &json!(1000),
            &raw_rates(json!({"L2": {"vertical": 10, "horizontal_intervals": {"LD_to_LQ": 99}}})),
            Some(&global),
            &levels,
        )
        .unwrap();

        let expected = IntervalRates::uniform(pct(4));
        assert_eq!(inputs.rates["L1"].horizontal_intervals, expected);
        assert_eq!(inputs.rates["L2"].horizontal_intervals, expected);
        assert_eq!(inputs.rates["L2"].vertical, Some(pct(10)));
        assert_eq!(inputs.global_horizontal_intervals, Some(expected));
    }

    #[test]
    fn test_bad_global_interval_is_reported() {
        let global: RawIntervals = serde_json::from_value(json!({"LQ_to_M": "abc"})).unwrap();
        let errors = validate_global_intervals(&global);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Global horizontal interval LQ_to_M"));
    }
}
