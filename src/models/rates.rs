//! Growth rate inputs for grade scenarios.
//!
//! Rates arrive on the wire as loosely-typed JSON (numbers, numeric strings,
//! empty strings, or null). The `Raw*` types capture that payload verbatim so
//! the validator can report every problem; once validated, rates are carried
//! as [`Percentage`] values inside [`LevelRates`] and [`IntervalRates`].

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A percentage in the closed range `[0, 100]`.
///
/// Serialized as a plain JSON number (e.g. `12.5`, never `0.125`).
///
/// # Example
///
/// ```
/// use salary_grading::models::Percentage;
/// use rust_decimal::Decimal;
///
/// let rate = Percentage::new(Decimal::from(10)).unwrap();
/// assert_eq!(rate.as_fraction(), Decimal::new(1, 1));
/// assert!(Percentage::new(Decimal::from(101)).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(Decimal);

impl Percentage {
    /// Zero percent.
    pub const ZERO: Percentage = Percentage(Decimal::ZERO);

    /// Creates a percentage, returning `None` when the value is outside `[0, 100]`.
    pub fn new(value: Decimal) -> Option<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            None
        } else {
            Some(Self(value))
        }
    }

    /// The percentage value, e.g. `10` for 10%.
    pub fn value(self) -> Decimal {
        self.0
    }

    /// The percentage as a fraction, e.g. `0.1` for 10%.
    pub fn as_fraction(self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    /// The growth multiplier `1 + p/100`.
    pub fn multiplier(self) -> Decimal {
        Decimal::ONE + self.as_fraction()
    }

    /// Returns true for an explicit 0%.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = rust_decimal::serde::float::deserialize(deserializer)?;
        Percentage::new(value)
            .ok_or_else(|| D::Error::custom(format!("percentage {} is outside 0..=100", value)))
    }
}

/// One of the four fixed steps between adjacent grade points within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntervalKey {
    /// Lower decile to lower quartile.
    #[serde(rename = "LD_to_LQ")]
    LdToLq,
    /// Lower quartile to median.
    #[serde(rename = "LQ_to_M")]
    LqToM,
    /// Median to upper quartile.
    #[serde(rename = "M_to_UQ")]
    MToUq,
    /// Upper quartile to upper decile.
    #[serde(rename = "UQ_to_UD")]
    UqToUd,
}

impl IntervalKey {
    /// All interval keys in compounding order.
    pub const ALL: [IntervalKey; 4] = [
        IntervalKey::LdToLq,
        IntervalKey::LqToM,
        IntervalKey::MToUq,
        IntervalKey::UqToUd,
    ];

    /// The wire name of the interval.
    pub fn as_str(self) -> &'static str {
        match self {
            IntervalKey::LdToLq => "LD_to_LQ",
            IntervalKey::LqToM => "LQ_to_M",
            IntervalKey::MToUq => "M_to_UQ",
            IntervalKey::UqToUd => "UQ_to_UD",
        }
    }
}

impl fmt::Display for IntervalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four horizontal interval rates of a level. Unset intervals are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRates {
    /// Lower decile to lower quartile.
    #[serde(rename = "LD_to_LQ", default)]
    pub ld_to_lq: Option<Percentage>,
    /// Lower quartile to median.
    #[serde(rename = "LQ_to_M", default)]
    pub lq_to_m: Option<Percentage>,
    /// Median to upper quartile.
    #[serde(rename = "M_to_UQ", default)]
    pub m_to_uq: Option<Percentage>,
    /// Upper quartile to upper decile.
    #[serde(rename = "UQ_to_UD", default)]
    pub uq_to_ud: Option<Percentage>,
}

impl IntervalRates {
    /// Sets every interval to the same rate.
    pub fn uniform(rate: Percentage) -> Self {
        Self {
            ld_to_lq: Some(rate),
            lq_to_m: Some(rate),
            m_to_uq: Some(rate),
            uq_to_ud: Some(rate),
        }
    }

    /// Returns the rate for an interval, if set.
    pub fn get(&self, key: IntervalKey) -> Option<Percentage> {
        match key {
            IntervalKey::LdToLq => self.ld_to_lq,
            IntervalKey::LqToM => self.lq_to_m,
            IntervalKey::MToUq => self.m_to_uq,
            IntervalKey::UqToUd => self.uq_to_ud,
        }
    }

    /// Sets or clears the rate for an interval.
    pub fn set(&mut self, key: IntervalKey, rate: Option<Percentage>) {
        let slot = match key {
            IntervalKey::LdToLq => &mut self.ld_to_lq,
            IntervalKey::LqToM => &mut self.lq_to_m,
            IntervalKey::MToUq => &mut self.m_to_uq,
            IntervalKey::UqToUd => &mut self.uq_to_ud,
        };
        *slot = rate;
    }

    /// Returns the rate for an interval, treating unset as 0%.
    pub fn rate_or_zero(&self, key: IntervalKey) -> Percentage {
        self.get(key).unwrap_or(Percentage::ZERO)
    }

    /// Iterates over the intervals that are set, in compounding order.
    pub fn present(&self) -> impl Iterator<Item = Percentage> + '_ {
        IntervalKey::ALL.into_iter().filter_map(|key| self.get(key))
    }

    /// Returns true when no interval is set.
    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

/// Validated rate inputs for one hierarchy level.
///
/// `vertical` is the step-up from this level's lower decile to the lower decile of
/// the level directly above it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRates {
    /// Vertical growth rate to the next level up.
    #[serde(default)]
    pub vertical: Option<Percentage>,
    /// Horizontal interval rates within this level.
    #[serde(default)]
    pub horizontal_intervals: IntervalRates,
}

/// Validated rate inputs keyed by level name.
pub type RateMap = BTreeMap<String, LevelRates>;

/// A raw rate value exactly as received (number, string, or null).
pub type RawRate = serde_json::Value;

/// Raw horizontal interval payload keyed by interval name.
pub type RawIntervals = BTreeMap<String, RawRate>;

/// Raw per-level rate payload as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLevelRates {
    /// Raw vertical rate; `null`, `""` or missing means unset.
    #[serde(default)]
    pub vertical: RawRate,
    /// Raw horizontal intervals; missing or `null` means all unset.
    #[serde(default)]
    pub horizontal_intervals: Option<RawIntervals>,
}

/// Raw rate payload keyed by level name.
pub type RawRateMap = BTreeMap<String, RawLevelRates>;
