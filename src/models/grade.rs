//! Grade table models.
//!
//! A [`GradeRow`] holds the five salary statistics of a single level. A
//! [`SalaryGrade`] is the materialised copy of a row belonging to the scenario
//! that is currently applied to a grading system.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// The five grade points of a level, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradePoint {
    /// Lower decile.
    #[serde(rename = "LD")]
    LowerDecile,
    /// Lower quartile.
    #[serde(rename = "LQ")]
    LowerQuartile,
    /// Median.
    #[serde(rename = "M")]
    Median,
    /// Upper quartile.
    #[serde(rename = "UQ")]
    UpperQuartile,
    /// Upper decile.
    #[serde(rename = "UD")]
    UpperDecile,
}

impl GradePoint {
    /// All grade points in ascending order.
    pub const ALL: [GradePoint; 5] = [
        GradePoint::LowerDecile,
        GradePoint::LowerQuartile,
        GradePoint::Median,
        GradePoint::UpperQuartile,
        GradePoint::UpperDecile,
    ];

    /// The wire name of the point (`"LD"`, `"LQ"`, `"M"`, `"UQ"`, `"UD"`).
    pub fn label(self) -> &'static str {
        match self {
            GradePoint::LowerDecile => "LD",
            GradePoint::LowerQuartile => "LQ",
            GradePoint::Median => "M",
            GradePoint::UpperQuartile => "UQ",
            GradePoint::UpperDecile => "UD",
        }
    }
}

/// The salary band of one level.
///
/// For non-negative interval rates the points are non-decreasing:
/// `LD <= LQ <= M <= UQ <= UD`.
///
/// # Example
///
/// ```
/// use salary_grading::models::{GradePoint, GradeRow};
/// use rust_decimal::Decimal;
///
/// let row = GradeRow {
///     ld: Decimal::from(1000),
///     lq: Decimal::from(1050),
///     m: Decimal::from(1103),
///     uq: Decimal::from(1158),
///     ud: Decimal::from(1216),
/// };
/// assert_eq!(row.get(GradePoint::Median), Decimal::from(1103));
/// assert!(row.is_monotonic());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRow {
    /// Lower decile.
    #[serde(rename = "LD", with = "rust_decimal::serde::float")]
    pub ld: Decimal,
    /// Lower quartile.
    #[serde(rename = "LQ", with = "rust_decimal::serde::float")]
    pub lq: Decimal,
    /// Median.
    #[serde(rename = "M", with = "rust_decimal::serde::float")]
    pub m: Decimal,
    /// Upper quartile.
    #[serde(rename = "UQ", with = "rust_decimal::serde::float")]
    pub uq: Decimal,
    /// Upper decile.
    #[serde(rename = "UD", with = "rust_decimal::serde::float")]
    pub ud: Decimal,
}

impl GradeRow {
    /// Returns the value of a grade point.
    pub fn get(&self, point: GradePoint) -> Decimal {
        match point {
            GradePoint::LowerDecile => self.ld,
            GradePoint::LowerQuartile => self.lq,
            GradePoint::Median => self.m,
            GradePoint::UpperQuartile => self.uq,
            GradePoint::UpperDecile => self.ud,
        }
    }

    /// Returns the points in ascending order.
    pub fn points(&self) -> [Decimal; 5] {
        [self.ld, self.lq, self.m, self.uq, self.ud]
    }

    /// Returns true when every point is at least the one before it.
    pub fn is_monotonic(&self) -> bool {
        self.points().windows(2).all(|pair| pair[0] <= pair[1])
    }
}

/// A full grade table keyed by level name.
pub type GradeTable = BTreeMap<String, GradeRow>;

/// Materialised grade of one level for the scenario currently applied to a grading system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryGrade {
    /// The grading system the grade belongs to.
    pub grading_system_id: String,
    /// The level name.
    pub level_name: String,
    /// The level number (1 = highest authority).
    pub level: u32,
    /// The grade points.
    #[serde(flatten)]
    pub grades: GradeRow,
    /// The scenario these grades were materialised from.
    pub source_scenario_id: Uuid,
    /// When the grades were written.
    pub updated_at: DateTime<Utc>,
}

/// A grade row prepared for display.
///
/// Zero or missing points are rendered as an empty string rather than `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DisplayGradeRow {
    /// Lower decile.
    #[serde(rename = "LD", serialize_with = "serialize_display_point")]
    pub ld: Option<Decimal>,
    /// Lower quartile.
    #[serde(rename = "LQ", serialize_with = "serialize_display_point")]
    pub lq: Option<Decimal>,
    /// Median.
    #[serde(rename = "M", serialize_with = "serialize_display_point")]
    pub m: Option<Decimal>,
    /// Upper quartile.
    #[serde(rename = "UQ", serialize_with = "serialize_display_point")]
    pub uq: Option<Decimal>,
    /// Upper decile.
    #[serde(rename = "UD", serialize_with = "serialize_display_point")]
    pub ud: Option<Decimal>,
}

impl From<GradeRow> for DisplayGradeRow {
    fn from(row: GradeRow) -> Self {
        Self {
            ld: Some(row.ld),
            lq: Some(row.lq),
            m: Some(row.m),
            uq: Some(row.uq),
            ud: Some(row.ud),
        }
    }
}

fn serialize_display_point<S: Serializer>(
    value: &Option<Decimal>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value.filter(|v| !v.is_zero()).and_then(|v| v.to_f64()) {
        Some(number) => serializer.serialize_f64(number),
        None => serializer.serialize_str(""),
    }
}
