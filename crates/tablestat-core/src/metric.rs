//! The fixed, ordered catalog of tracked load metrics.
//!
//! Each [`Metric`] knows how to aggregate two values into a summary, how to
//! order values, and how to render a value or a rate. The ordinal position in
//! [`Metric::ALL`] is part of the public interface: single-key sort selection
//! ([`SortSpec`](crate::SortSpec)) maps keys `1`..`9`,`0` to ordinals 1..10,
//! so new metrics must only ever be appended.
//!
//! | # | metric             | shape | value key | diff key |
//! |---|--------------------|-------|-----------|----------|
//! | 1 | `Reads`            | count | `1`       | `!`      |
//! | 2 | `Writes`           | count | `2`       | `@`      |
//! | 3 | `Regions`          | count | `3`       | `#`      |
//! | 4 | `Files`            | count | `4`       | `$`      |
//! | 5 | `FileSizeMB`       | MB    | `5`       | `%`      |
//! | 6 | `FileSizeUncompMB` | MB    | `6`       | `^`      |
//! | 7 | `DataLocality`     | ratio | `7`       | `&`      |
//! | 8 | `MemstoreSizeMB`   | MB    | `8`       | `*`      |
//! | 9 | `CompactedKVs`     | count | `9`       | `(`      |
//! |10 | `CompactingKVs`    | count | `0`       | `)`      |

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};
use crate::value::{RatioValue, Value};

/// Display string for an absent value.
pub const NOT_AVAILABLE: &str = "N/A";

/// How a metric's values are shaped, aggregated and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Plain counter, summed.
    Count,
    /// Size in megabytes, summed, rendered with an `MB` suffix.
    Megabytes,
    /// Weighted fraction, aggregated as a weighted mean, rendered as a percentage.
    Ratio,
}

/// One tracked load metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Reads,
    Writes,
    Regions,
    Files,
    FileSizeMB,
    FileSizeUncompMB,
    DataLocality,
    MemstoreSizeMB,
    CompactedKVs,
    CompactingKVs,
}

impl Metric {
    /// Every metric in catalog order.
    pub const ALL: [Metric; 10] = [
        Metric::Reads,
        Metric::Writes,
        Metric::Regions,
        Metric::Files,
        Metric::FileSizeMB,
        Metric::FileSizeUncompMB,
        Metric::DataLocality,
        Metric::MemstoreSizeMB,
        Metric::CompactedKVs,
        Metric::CompactingKVs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Reads => "Reads",
            Self::Writes => "Writes",
            Self::Regions => "Regions",
            Self::Files => "Files",
            Self::FileSizeMB => "FileSizeMB",
            Self::FileSizeUncompMB => "FileSizeUncompMB",
            Self::DataLocality => "DataLocality",
            Self::MemstoreSizeMB => "MemstoreSizeMB",
            Self::CompactedKVs => "CompactedKVs",
            Self::CompactingKVs => "CompactingKVs",
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            Self::FileSizeMB | Self::FileSizeUncompMB | Self::MemstoreSizeMB => {
                MetricKind::Megabytes
            }
            Self::DataLocality => MetricKind::Ratio,
            _ => MetricKind::Count,
        }
    }

    /// 1-based position in [`Metric::ALL`].
    pub fn ordinal(self) -> usize {
        Self::ALL
            .iter()
            .position(|m| *m == self)
            .map_or(0, |i| i + 1)
    }

    /// Inverse of [`ordinal`](Self::ordinal).
    pub fn from_ordinal(ordinal: usize) -> Option<Metric> {
        ordinal
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// The aggregation identity, standing in for "absent".
    pub fn identity(self) -> Value {
        match self.kind() {
            MetricKind::Ratio => Value::Ratio(RatioValue::ZERO),
            MetricKind::Count | MetricKind::Megabytes => Value::Count(0),
        }
    }

    /// Bring a value into this metric's shape. A count reported for a ratio
    /// metric becomes a unit-weight ratio; a ratio reported for a counter keeps
    /// its rounded ratio.
    pub fn coerce(self, value: Value) -> Value {
        match (self.kind(), value) {
            (MetricKind::Ratio, Value::Count(n)) => Value::Ratio(RatioValue::new(1.0, n as f64)),
            (MetricKind::Count | MetricKind::Megabytes, Value::Ratio(r)) => {
                Value::Count(r.ratio.round() as i64)
            }
            (_, v) => v,
        }
    }

    /// Combine a running summary value with an incoming one.
    pub fn aggregate(self, current: Value, incoming: Value) -> Value {
        match (self.coerce(current), self.coerce(incoming)) {
            (Value::Ratio(a), Value::Ratio(b)) => Value::Ratio(a.add(b)),
            (Value::Count(a), Value::Count(b)) => Value::Count(a.saturating_add(b)),
            // coerce() leaves both sides in the metric's shape
            (a, _) => a,
        }
    }

    /// Ascending order by scalar projection (ratios by `ratio`, never `weight`).
    pub fn compare(self, a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Count(x), Value::Count(y)) => x.cmp(y),
            (Value::Ratio(x), Value::Ratio(y)) => x.compare(y),
            _ => a.scalar().total_cmp(&b.scalar()),
        }
    }

    /// [`compare`](Self::compare) lifted over absent values, which sort first.
    pub fn compare_opt(self, a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (Some(x), Some(y)) => self.compare(x, y),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        }
    }

    /// Human-readable value; `"N/A"` when absent.
    pub fn to_display_string(self, value: Option<&Value>) -> String {
        let Some(value) = value else {
            return NOT_AVAILABLE.to_string();
        };
        match (self.kind(), value) {
            (MetricKind::Ratio, v) => format_percent(v.scalar()),
            (MetricKind::Megabytes, Value::Count(n)) => format!("{n}MB"),
            (MetricKind::Megabytes, v) => format!("{:.0}MB", v.scalar()),
            (MetricKind::Count, Value::Count(n)) => n.to_string(),
            (MetricKind::Count, v) => format!("{:.0}", v.scalar()),
        }
    }

    /// Per-second rate of a delta over `elapsed_millis`, one decimal place.
    /// For ratio metrics `delta` is the change of the ratio, rendered as a percentage.
    pub fn to_rate_string(self, delta: Option<&Value>, elapsed_millis: u64) -> String {
        let Some(delta) = delta else {
            return NOT_AVAILABLE.to_string();
        };
        if elapsed_millis == 0 {
            return NOT_AVAILABLE.to_string();
        }
        let per_sec = delta.scalar() / (elapsed_millis as f64 / 1000.0);
        match self.kind() {
            MetricKind::Ratio => format!("{}/s", format_percent(per_sec)),
            MetricKind::Megabytes => format!("{per_sec:.1}MB/s"),
            MetricKind::Count => format!("{per_sec:.1}/s"),
        }
    }

    /// Parse a canonical CSV cell for this metric. Empty cells are absent.
    pub fn parse_canonical(self, cell: &str) -> Result<Option<Value>> {
        let cell = cell.trim();
        if cell.is_empty() {
            return Ok(None);
        }
        let value = match self.kind() {
            MetricKind::Ratio => Value::Ratio(cell.parse()?),
            MetricKind::Count | MetricKind::Megabytes => Value::Count(
                cell.parse()
                    .map_err(|_| Error::InvalidValue(cell.to_string()))?,
            ),
        };
        Ok(Some(value))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Percentage with two decimals, rounding half away from zero.
///
/// Rounding happens on the scaled value before formatting so that `{:.2}`
/// never applies its own (half-to-even) rounding; the sign of a value that
/// rounds to zero is kept (`-0.00%`).
fn format_percent(ratio: f64) -> String {
    let hundredths = (ratio * 10_000.0).round();
    format!("{:.2}%", hundredths / 100.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order_is_stable() {
        let names: Vec<&str> = Metric::ALL.iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            [
                "Reads",
                "Writes",
                "Regions",
                "Files",
                "FileSizeMB",
                "FileSizeUncompMB",
                "DataLocality",
                "MemstoreSizeMB",
                "CompactedKVs",
                "CompactingKVs",
            ]
        );
    }

    #[test]
    fn ordinal_roundtrip() {
        for m in Metric::ALL {
            assert_eq!(Metric::from_ordinal(m.ordinal()), Some(m));
        }
        assert_eq!(Metric::from_ordinal(0), None);
        assert_eq!(Metric::from_ordinal(11), None);
    }

    #[test]
    fn from_name_matches_display() {
        for m in Metric::ALL {
            assert_eq!(Metric::from_name(&m.to_string()), Some(m));
        }
        assert_eq!(Metric::from_name("reads"), None);
    }

    #[test]
    fn aggregate_counts_sum() {
        let v = Metric::Reads.aggregate(Value::Count(3), Value::Count(4));
        assert_eq!(v, Value::Count(7));
        assert_eq!(
            Metric::Reads.aggregate(Metric::Reads.identity(), Value::Count(9)),
            Value::Count(9)
        );
    }

    #[test]
    fn aggregate_locality_weighted() {
        let v = Metric::DataLocality.aggregate(
            Value::Ratio(RatioValue::new(1.0, 0.5)),
            Value::Ratio(RatioValue::new(0.0, 0.0)),
        );
        assert_eq!(v, Value::Ratio(RatioValue::new(1.0, 0.5)));
    }

    #[test]
    fn compare_ratio_uses_ratio_not_weight() {
        let heavy_low = Value::Ratio(RatioValue::new(1000.0, 0.1));
        let light_high = Value::Ratio(RatioValue::new(1.0, 0.9));
        assert_eq!(
            Metric::DataLocality.compare(&heavy_low, &light_high),
            Ordering::Less
        );
    }

    #[test]
    fn compare_opt_absent_first() {
        let one = Value::Count(1);
        assert_eq!(Metric::Reads.compare_opt(None, Some(&one)), Ordering::Less);
        assert_eq!(Metric::Reads.compare_opt(None, None), Ordering::Equal);
    }

    #[test]
    fn display_absent() {
        for m in Metric::ALL {
            assert_eq!(m.to_display_string(None), "N/A");
        }
    }

    #[test]
    fn display_counts_and_megabytes() {
        assert_eq!(Metric::Writes.to_display_string(Some(&Value::Count(1))), "1");
        assert_eq!(
            Metric::MemstoreSizeMB.to_display_string(Some(&Value::Count(112233))),
            "112233MB"
        );
        assert_eq!(Metric::Reads.to_display_string(Some(&Value::Count(-4))), "-4");
    }

    #[test]
    fn display_percent_rounding() {
        let show = |r: f64| {
            Metric::DataLocality.to_display_string(Some(&Value::Ratio(RatioValue::new(1.0, r))))
        };
        assert_eq!(show(-0.000001), "-0.00%");
        assert_eq!(show(0.999999), "100.00%");
        assert_eq!(show(0.5), "50.00%");
        assert_eq!(show(0.125), "12.50%");
        assert_eq!(show(0.0), "0.00%");
    }

    #[test]
    fn rate_strings() {
        assert_eq!(Metric::Reads.to_rate_string(Some(&Value::Count(30)), 10_000), "3.0/s");
        assert_eq!(
            Metric::FileSizeMB.to_rate_string(Some(&Value::Count(5)), 2_000),
            "2.5MB/s"
        );
        let delta = Value::Ratio(RatioValue::new(1.0, 0.1));
        assert_eq!(
            Metric::DataLocality.to_rate_string(Some(&delta), 10_000),
            "1.00%/s"
        );
    }

    #[test]
    fn rate_without_elapsed_is_not_available() {
        assert_eq!(Metric::Reads.to_rate_string(Some(&Value::Count(3)), 0), "N/A");
        assert_eq!(Metric::Reads.to_rate_string(None, 1000), "N/A");
    }

    #[test]
    fn parse_canonical_cells() {
        assert_eq!(Metric::Reads.parse_canonical("12").unwrap(), Some(Value::Count(12)));
        assert_eq!(Metric::Reads.parse_canonical("").unwrap(), None);
        assert_eq!(
            Metric::DataLocality.parse_canonical("2:0.25").unwrap(),
            Some(Value::Ratio(RatioValue::new(2.0, 0.25)))
        );
        assert!(Metric::Reads.parse_canonical("1:0.5").is_err());
        assert!(Metric::DataLocality.parse_canonical("0.5").is_err());
    }

    #[test]
    fn coerce_count_into_ratio() {
        assert_eq!(
            Metric::DataLocality.coerce(Value::Count(1)),
            Value::Ratio(RatioValue::new(1.0, 1.0))
        );
        assert_eq!(Metric::Reads.coerce(Value::Count(1)), Value::Count(1));
    }
}
