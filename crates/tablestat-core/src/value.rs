//! Numeric cell values: plain counts and weight-bearing ratios.
//!
//! A [`RatioValue`] such as data locality cannot be summed across entities:
//! a server holding 1 GB at 50% locality and one holding nothing at 0% are
//! together still at 50%. Ratios therefore carry a weight and aggregate as a
//! weighted mean. Every other metric is a [`Value::Count`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// ---------------------------------------------------------------------------
// RatioValue
// ---------------------------------------------------------------------------

/// A weighted fraction. Ordering looks at `ratio` only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatioValue {
    pub weight: f64,
    pub ratio: f64,
}

impl RatioValue {
    /// Identity element of [`RatioValue::add`].
    pub const ZERO: RatioValue = RatioValue {
        weight: 0.0,
        ratio: 0.0,
    };

    pub fn new(weight: f64, ratio: f64) -> Self {
        Self { weight, ratio }
    }

    /// Weighted-mean combination. Two weightless values combine to [`ZERO`](Self::ZERO).
    pub fn add(self, other: RatioValue) -> RatioValue {
        if other == RatioValue::ZERO {
            return self;
        }
        if self == RatioValue::ZERO {
            return other;
        }
        let weight = self.weight + other.weight;
        if weight == 0.0 {
            return RatioValue::ZERO;
        }
        // Skipping the arithmetic keeps a weightless side from perturbing the ratio bits.
        if other.weight == 0.0 {
            return self;
        }
        if self.weight == 0.0 {
            return other;
        }
        RatioValue {
            weight,
            ratio: (self.ratio * self.weight + other.ratio * other.weight) / weight,
        }
    }

    /// Change of the ratio relative to `previous`, keeping this value's weight.
    pub fn delta(self, previous: RatioValue) -> RatioValue {
        RatioValue {
            weight: self.weight,
            ratio: self.ratio - previous.ratio,
        }
    }

    /// `"<weight>:<ratio>"`. Rust's float `Display` is the shortest string that
    /// parses back to the same bits, so this form round-trips exactly.
    pub fn to_canonical_string(&self) -> String {
        format!("{}:{}", self.weight, self.ratio)
    }

    pub fn compare(&self, other: &RatioValue) -> Ordering {
        self.ratio.total_cmp(&other.ratio)
    }
}

impl fmt::Display for RatioValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl FromStr for RatioValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidValue(s.to_string());
        let (weight, ratio) = s.trim().split_once(':').ok_or_else(invalid)?;
        let weight: f64 = weight.parse().map_err(|_| invalid())?;
        let ratio: f64 = ratio.parse().map_err(|_| invalid())?;
        Ok(RatioValue { weight, ratio })
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// Closed set of cell value shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Count(i64),
    Ratio(RatioValue),
}

impl Value {
    /// Scalar projection used for ordering: the count itself, or a ratio's `ratio`.
    pub fn scalar(&self) -> f64 {
        match self {
            Self::Count(n) => *n as f64,
            Self::Ratio(r) => r.ratio,
        }
    }

    /// `self - previous`. Mixed shapes are compared through their scalar projection.
    pub fn delta(&self, previous: &Value) -> Value {
        match (self, previous) {
            (Self::Count(a), Self::Count(b)) => Self::Count(a.saturating_sub(*b)),
            (Self::Ratio(a), Self::Ratio(b)) => Self::Ratio(a.delta(*b)),
            (Self::Ratio(a), other) => Self::Ratio(RatioValue::new(a.weight, a.ratio - other.scalar())),
            (Self::Count(a), Self::Ratio(b)) => Self::Count(a.saturating_sub(b.ratio.round() as i64)),
        }
    }

    /// Canonical (lossless) cell form used by the CSV files.
    pub fn to_canonical_string(&self) -> String {
        match self {
            Self::Count(n) => n.to_string(),
            Self::Ratio(r) => r.to_canonical_string(),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Count(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Count(i64::from(n))
    }
}

impl From<RatioValue> for Value {
    fn from(r: RatioValue) -> Self {
        Self::Ratio(r)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
