//! Single-key sort selection.
//!
//! The key encoding is a stable contract with existing dashboard clients:
//!
//! - `1`..`9`, `0` sort by the *value* of metric ordinal 1..10
//! - `!` `@` `#` `$` `%` `^` `&` `*` `(` `)` (the shifted digits) sort by the
//!   *diff* of the same ordinals
//! - `` ` `` or `~` return to the natural entity order
//!
//! See [`crate::metric`] for the ordinal of every metric.

use std::fmt;

use crate::error::{Error, Result};
use crate::metric::Metric;

const VALUE_KEYS: [char; 10] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0'];
const DIFF_KEYS: [char; 10] = ['!', '@', '#', '$', '%', '^', '&', '*', '(', ')'];
const DEFAULT_KEYS: [char; 2] = ['`', '~'];

/// Whether rows are ranked by the current value or by the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Value,
    Diff,
}

/// Active row ordering. `metric == None` is the natural [`EntityKey`](crate::EntityKey) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub metric: Option<Metric>,
    pub mode: SortMode,
    pub ascending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            metric: None,
            mode: SortMode::Value,
            ascending: true,
        }
    }
}

impl SortSpec {
    pub fn by_value(metric: Metric) -> Self {
        Self {
            metric: Some(metric),
            ..Self::default()
        }
    }

    pub fn by_diff(metric: Metric) -> Self {
        Self {
            metric: Some(metric),
            mode: SortMode::Diff,
            ascending: true,
        }
    }

    pub fn is_default(&self) -> bool {
        self.metric.is_none()
    }

    /// Parse one input token. Anything but a single mapped character is rejected.
    pub fn parse(token: &str) -> Result<SortSpec> {
        let mut chars = token.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(Error::UnknownSortKey(token.to_string()));
        };
        Self::from_key(c).ok_or_else(|| Error::UnknownSortKey(token.to_string()))
    }

    /// Map a single key, or `None` if it selects nothing.
    pub fn from_key(c: char) -> Option<SortSpec> {
        if DEFAULT_KEYS.contains(&c) {
            return Some(SortSpec::default());
        }
        if let Some(i) = VALUE_KEYS.iter().position(|k| *k == c) {
            return Metric::from_ordinal(i + 1).map(SortSpec::by_value);
        }
        if let Some(i) = DIFF_KEYS.iter().position(|k| *k == c) {
            return Metric::from_ordinal(i + 1).map(SortSpec::by_diff);
        }
        None
    }

    /// The key that selects this spec (inverse of [`from_key`](Self::from_key)).
    pub fn key(&self) -> char {
        match self.metric {
            None => DEFAULT_KEYS[0],
            Some(m) => {
                let keys = match self.mode {
                    SortMode::Value => &VALUE_KEYS,
                    SortMode::Diff => &DIFF_KEYS,
                };
                keys[m.ordinal() - 1]
            }
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.metric, self.mode) {
            (None, _) => write!(f, "natural order"),
            (Some(m), SortMode::Value) => write!(f, "{m}"),
            (Some(m), SortMode::Diff) => write!(f, "{m} (diff)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_select_value_sort() {
        assert_eq!(SortSpec::parse("1").unwrap(), SortSpec::by_value(Metric::Reads));
        assert_eq!(SortSpec::parse("7").unwrap(), SortSpec::by_value(Metric::DataLocality));
        assert_eq!(SortSpec::parse("0").unwrap(), SortSpec::by_value(Metric::CompactingKVs));
    }

    #[test]
    fn shifted_digits_select_diff_sort() {
        assert_eq!(SortSpec::parse("!").unwrap(), SortSpec::by_diff(Metric::Reads));
        assert_eq!(SortSpec::parse("@").unwrap(), SortSpec::by_diff(Metric::Writes));
        assert_eq!(SortSpec::parse(")").unwrap(), SortSpec::by_diff(Metric::CompactingKVs));
    }

    #[test]
    fn backtick_restores_default() {
        assert!(SortSpec::parse("`").unwrap().is_default());
        assert!(SortSpec::parse("~").unwrap().is_default());
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        for token in ["", "a", "12", "-", " ", "!!"] {
            assert!(
                matches!(SortSpec::parse(token), Err(Error::UnknownSortKey(_))),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn key_is_inverse_of_from_key() {
        for c in VALUE_KEYS.iter().chain(DIFF_KEYS.iter()) {
            let spec = SortSpec::from_key(*c).unwrap();
            assert_eq!(spec.key(), *c);
        }
        assert_eq!(SortSpec::default().key(), '`');
    }

    #[test]
    fn every_metric_has_both_keys() {
        for m in Metric::ALL {
            assert_eq!(SortSpec::from_key(SortSpec::by_value(m).key()), Some(SortSpec::by_value(m)));
            assert_eq!(SortSpec::from_key(SortSpec::by_diff(m).key()), Some(SortSpec::by_diff(m)));
        }
    }

    #[test]
    fn specs_are_ascending() {
        assert!(SortSpec::parse("3").unwrap().ascending);
        assert!(SortSpec::parse("#").unwrap().ascending);
    }

    #[test]
    fn display() {
        assert_eq!(SortSpec::default().to_string(), "natural order");
        assert_eq!(SortSpec::by_value(Metric::Reads).to_string(), "Reads");
        assert_eq!(SortSpec::by_diff(Metric::Writes).to_string(), "Writes (diff)");
    }
}
