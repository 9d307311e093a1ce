//! The load engine: current/previous generations, diffing, change detection
//! and ranking.
//!
//! # Generations
//!
//! `current` is the latest complete iteration. `previous` is the diff
//! subtrahend: the immediately preceding iteration while diffing from
//! previous, or a frozen baseline while `diff_from_start` is set. A batch is
//! applied in one call ([`LoadState::apply_at`]), so a half-built generation is
//! never observable by anyone holding the same lock.
//!
//! # Baseline capture
//!
//! - Turning `diff_from_start` on freezes the generation that is current at
//!   toggle time: it becomes the baseline at the next [`prepare`](LoadState::prepare).
//! - [`reset_diff_start_point`](LoadState::reset_diff_start_point) makes the
//!   next iteration behave like the first one (empty baseline, zero elapsed);
//!   that iteration's generation becomes the baseline one `prepare` later.
//! - Loading a saved file installs it as the baseline immediately.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::entity::{EntityKey, Level};
use crate::error::{Error, Result};
use crate::metric::{Metric, NOT_AVAILABLE};
use crate::persist::CsvLog;
use crate::sample::{Generation, Sample};
use crate::sort::{SortMode, SortSpec};
use crate::source::{Batch, LoadSource};
use crate::value::Value;

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// View mode flags. Toggling never touches stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Flags {
    pub diff_from_start: bool,
    pub show_changed_only: bool,
    pub show_rate: bool,
}

/// Pending baseline re-capture, consumed by [`LoadState::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BaselineCapture {
    #[default]
    Idle,
    /// Copy the current generation into `previous` at the next prepare.
    NextPrepare,
    /// Clear `previous` at the next prepare, then capture one prepare later.
    AfterNextPrepare,
}

pub struct LoadState {
    level: Level,
    current: Generation,
    previous: Generation,
    flags: Flags,
    sort: SortSpec,
    capture: BaselineCapture,
    changed_entities: BTreeSet<EntityKey>,
    changed_cells: BTreeSet<(EntityKey, Metric)>,
    changed_summary: BTreeSet<Metric>,
    iterations: u64,
    log: Option<CsvLog>,
}

impl LoadState {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            current: Generation::default(),
            previous: Generation::default(),
            flags: Flags::default(),
            sort: SortSpec::default(),
            capture: BaselineCapture::Idle,
            changed_entities: BTreeSet::new(),
            changed_cells: BTreeSet::new(),
            changed_summary: BTreeSet::new(),
            iterations: 0,
            log: None,
        }
    }

    /// Append every applied iteration to `log`.
    pub fn with_log(mut self, log: CsvLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn set_log(&mut self, log: Option<CsvLog>) {
        self.log = log;
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    /// Collect one batch from `source` and apply it. A failing source leaves
    /// the state exactly as it was.
    pub fn update(&mut self, source: &mut dyn LoadSource) -> Result<()> {
        self.check_level(source.level())?;
        let batch = source.collect()?;
        let now = source.collected_at().unwrap_or_else(epoch_millis);
        self.apply_at(batch, now);
        Ok(())
    }

    /// Reject a source whose rows would land under the wrong entity column.
    pub fn check_level(&self, level: Level) -> Result<()> {
        if level != self.level {
            return Err(Error::LevelMismatch {
                found: level,
                expected: self.level,
            });
        }
        Ok(())
    }

    /// prepare → ingest the whole batch → change detection → optional log append.
    pub fn apply_at(&mut self, batch: Batch, now: u64) {
        self.prepare(now);
        for (entity, sample) in batch {
            self.ingest(entity, sample);
        }
        self.update_change_map();
        self.iterations += 1;
        log::debug!(
            "iteration {}: {} {} entities, elapsed {}ms",
            self.iterations,
            self.current.len(),
            self.level,
            self.elapsed_millis()
        );

        if let Some(writer) = self.log.as_mut()
            && let Err(e) = writer.append(&self.current)
        {
            log::warn!("continuous log {}: {e}", writer.path().display());
        }
    }

    /// Rotate or keep the baseline, then start an empty current generation
    /// at `now` (clamped so timestamps never go backwards).
    pub fn prepare(&mut self, now: u64) {
        let now = now.max(self.current.timestamp());
        match self.capture {
            BaselineCapture::AfterNextPrepare => {
                self.previous = Generation::empty(now);
                self.capture = BaselineCapture::NextPrepare;
            }
            BaselineCapture::NextPrepare => {
                self.previous = std::mem::take(&mut self.current);
                self.capture = BaselineCapture::Idle;
            }
            BaselineCapture::Idle => {
                if !self.flags.diff_from_start {
                    self.previous = std::mem::take(&mut self.current);
                }
            }
        }
        self.current = Generation::empty(now);
    }

    /// Add one entity's sample to the generation being assembled.
    pub fn ingest(&mut self, entity: EntityKey, sample: Sample) {
        self.current.ingest(entity, sample);
    }

    /// Fold a value into the summary of the generation being assembled.
    pub fn fold_into_summary(&mut self, metric: Metric, value: Value) {
        self.current.fold_into_summary(metric, value);
    }

    /// Recompute changed entities, cells and summary metrics from scratch.
    ///
    /// Entities without a previous record and a completely empty previous
    /// generation produce no changes: there is nothing to compare against.
    pub fn update_change_map(&mut self) {
        self.changed_entities.clear();
        self.changed_cells.clear();
        self.changed_summary.clear();

        for (entity, sample) in self.current.samples() {
            let Some(prev) = self.previous.sample(entity) else {
                continue;
            };
            for metric in Metric::ALL {
                if metric.compare_opt(sample.get(metric), prev.get(metric)) != Ordering::Equal {
                    self.changed_cells.insert((entity.clone(), metric));
                    self.changed_entities.insert(entity.clone());
                }
            }
        }

        if !self.previous.is_empty() {
            let (cur, prev) = (self.current.summary(), self.previous.summary());
            for metric in Metric::ALL {
                if metric.compare_opt(cur.get(metric), prev.get(metric)) != Ordering::Equal {
                    self.changed_summary.insert(metric);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Baseline
    // -----------------------------------------------------------------------

    /// Re-capture the baseline as if the next iteration were the first one.
    pub fn reset_diff_start_point(&mut self) {
        self.capture = BaselineCapture::AfterNextPrepare;
    }

    /// Install `baseline` as the diff subtrahend and switch to diff-from-start.
    pub fn install_baseline(&mut self, baseline: Generation) {
        self.previous = baseline;
        self.flags.diff_from_start = true;
        self.capture = BaselineCapture::Idle;
        self.update_change_map();
    }

    // -----------------------------------------------------------------------
    // Toggles and sort
    // -----------------------------------------------------------------------

    pub fn toggle_diff_from_start(&mut self) -> bool {
        self.flags.diff_from_start = !self.flags.diff_from_start;
        match (self.flags.diff_from_start, self.capture) {
            (true, BaselineCapture::Idle) => self.capture = BaselineCapture::NextPrepare,
            (false, BaselineCapture::NextPrepare) => self.capture = BaselineCapture::Idle,
            _ => {}
        }
        self.flags.diff_from_start
    }

    pub fn toggle_show_changed_only(&mut self) -> bool {
        self.flags.show_changed_only = !self.flags.show_changed_only;
        self.flags.show_changed_only
    }

    pub fn toggle_show_rate(&mut self) -> bool {
        self.flags.show_rate = !self.flags.show_rate;
        self.flags.show_rate
    }

    pub fn set_sort_spec(&mut self, spec: SortSpec) {
        self.sort = spec;
    }

    /// Parse and install a sort token; an unknown token leaves the sort unchanged.
    pub fn sort_by_token(&mut self, token: &str) -> Result<SortSpec> {
        let spec = SortSpec::parse(token)?;
        self.sort = spec;
        Ok(spec)
    }

    // -----------------------------------------------------------------------
    // Ranking
    // -----------------------------------------------------------------------

    /// Every current entity in the active sort order. Pure: repeated calls
    /// without a new iteration return the same sequence.
    pub fn sorted_entities(&self) -> Vec<&EntityKey> {
        // BTreeMap keys are already in natural order.
        let keys = self.current.samples().keys();
        let Some(metric) = self.sort.metric else {
            return keys.collect();
        };

        let mut keyed: Vec<(Option<Value>, &EntityKey)> = keys
            .map(|e| {
                let key = match self.sort.mode {
                    SortMode::Value => self.current.value(e, metric).copied(),
                    SortMode::Diff => self.diff_value(e, metric),
                };
                (key, e)
            })
            .collect();

        let ascending = self.sort.ascending;
        keyed.sort_by(|a, b| {
            let by_metric = metric.compare_opt(a.0.as_ref(), b.0.as_ref());
            let by_metric = if ascending { by_metric } else { by_metric.reverse() };
            by_metric.then_with(|| a.1.cmp(b.1))
        });
        keyed.into_iter().map(|(_, e)| e).collect()
    }

    /// [`sorted_entities`](Self::sorted_entities), restricted to changed
    /// entities when `show_changed_only` is set.
    pub fn visible_entities(&self) -> Vec<&EntityKey> {
        let sorted = self.sorted_entities();
        if !self.flags.show_changed_only {
            return sorted;
        }
        sorted
            .into_iter()
            .filter(|e| self.changed_entities.contains(*e))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Values and diffs
    // -----------------------------------------------------------------------

    /// `current - previous` for one cell, or `None` if either side is absent.
    pub fn diff_value(&self, entity: &EntityKey, metric: Metric) -> Option<Value> {
        let cur = self.current.value(entity, metric)?;
        let prev = self.previous.value(entity, metric)?;
        Some(cur.delta(prev))
    }

    pub fn summary_diff_value(&self, metric: Metric) -> Option<Value> {
        let cur = self.current.summary().get(metric)?;
        let prev = self.previous.summary().get(metric)?;
        Some(cur.delta(prev))
    }

    pub fn value_string(&self, entity: &EntityKey, metric: Metric) -> String {
        metric.to_display_string(self.current.value(entity, metric))
    }

    pub fn summary_value_string(&self, metric: Metric) -> String {
        metric.to_display_string(self.current.summary().get(metric))
    }

    /// Diff or rate for one cell, `"N/A"` when either side is absent.
    pub fn value_diff(&self, entity: &EntityKey, metric: Metric) -> String {
        self.format_diff(metric, self.diff_value(entity, metric))
    }

    pub fn summary_diff(&self, metric: Metric) -> String {
        self.format_diff(metric, self.summary_diff_value(metric))
    }

    fn format_diff(&self, metric: Metric, delta: Option<Value>) -> String {
        match delta {
            None => NOT_AVAILABLE.to_string(),
            Some(d) if self.flags.show_rate => {
                metric.to_rate_string(Some(&d), self.elapsed_millis())
            }
            Some(d) => metric.to_display_string(Some(&d)),
        }
    }

    /// `"<value> | <diff>"`, or just the value while no diff exists.
    pub fn cell_text(&self, entity: &EntityKey, metric: Metric) -> String {
        join_cell(
            self.value_string(entity, metric),
            self.diff_value(entity, metric)
                .map(|_| self.value_diff(entity, metric)),
        )
    }

    pub fn summary_cell_text(&self, metric: Metric) -> String {
        join_cell(
            self.summary_value_string(metric),
            self.summary_diff_value(metric)
                .map(|_| self.summary_diff(metric)),
        )
    }

    // -----------------------------------------------------------------------
    // Change queries
    // -----------------------------------------------------------------------

    pub fn is_record_changed(&self, entity: &EntityKey) -> bool {
        self.changed_entities.contains(entity)
    }

    pub fn is_value_changed(&self, entity: &EntityKey, metric: Metric) -> bool {
        self.changed_cells.contains(&(entity.clone(), metric))
    }

    pub fn is_summary_changed(&self, metric: Metric) -> bool {
        self.changed_summary.contains(&metric)
    }

    pub fn changed_entities(&self) -> &BTreeSet<EntityKey> {
        &self.changed_entities
    }

    pub fn changed_summary_metrics(&self) -> &BTreeSet<Metric> {
        &self.changed_summary
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn current(&self) -> &Generation {
        &self.current
    }

    pub fn previous(&self) -> &Generation {
        &self.previous
    }

    /// Per-entity samples of the current generation.
    pub fn load_map(&self) -> &std::collections::BTreeMap<EntityKey, Sample> {
        self.current.samples()
    }

    pub fn summary(&self) -> &Sample {
        self.current.summary()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn is_diff_from_start(&self) -> bool {
        self.flags.diff_from_start
    }

    pub fn is_show_changed_only(&self) -> bool {
        self.flags.show_changed_only
    }

    pub fn is_show_rate(&self) -> bool {
        self.flags.show_rate
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.sort
    }

    pub fn sort_description(&self) -> String {
        if self.sort.is_default() {
            format!("{} (natural order)", self.level.column_label())
        } else {
            self.sort.to_string()
        }
    }

    /// Epoch milliseconds of the current iteration.
    pub fn iteration_timestamp(&self) -> u64 {
        self.current.timestamp()
    }

    /// Epoch milliseconds of the diff subtrahend (previous iteration or baseline).
    pub fn baseline_timestamp(&self) -> u64 {
        self.previous.timestamp()
    }

    /// Time covered by the diffs currently shown.
    pub fn elapsed_millis(&self) -> u64 {
        if self.previous.is_empty() {
            return 0;
        }
        self.current
            .timestamp()
            .saturating_sub(self.previous.timestamp())
    }

    /// Number of iterations applied so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

fn join_cell(value: String, diff: Option<String>) -> String {
    match diff {
        Some(diff) => format!("{value} | {diff}"),
        None => value,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RatioValue;

    fn key(s: &str) -> EntityKey {
        EntityKey::from(s)
    }

    fn batch(rows: &[(&str, Sample)]) -> Batch {
        rows.iter()
            .map(|(name, sample)| (key(name), sample.clone()))
            .collect()
    }

    fn reads(n: i64) -> Sample {
        Sample::new().with(Metric::Reads, n)
    }

    #[test]
    fn first_iteration_has_no_diffs() {
        let mut state = LoadState::new(Level::Region);
        state.apply_at(
            batch(&[
                ("a", reads(1).with(Metric::Writes, 2)),
                ("b", reads(5).with_ratio(Metric::DataLocality, 1.0, 0.5)),
            ]),
            1_000,
        );
        for e in state.sorted_entities() {
            for m in Metric::ALL {
                assert_eq!(state.value_diff(e, m), "N/A");
            }
        }
        for m in Metric::ALL {
            assert_eq!(state.summary_diff(m), "N/A");
        }
        assert!(state.changed_entities().is_empty());
    }

    #[test]
    fn rec11_value_and_diff_columns() {
        let mut state = LoadState::new(Level::Region);
        let rec11 = key("rec11");
        state.apply_at(
            batch(&[("rec11", Sample::new().with(Metric::MemstoreSizeMB, 112233).with(Metric::Writes, 0))]),
            1_000,
        );
        assert_eq!(state.value_diff(&rec11, Metric::Writes), "N/A");
        assert_eq!(state.cell_text(&rec11, Metric::Writes), "0");

        state.apply_at(
            batch(&[("rec11", Sample::new().with(Metric::MemstoreSizeMB, 112233).with(Metric::Writes, 1))]),
            2_000,
        );
        assert_eq!(state.cell_text(&rec11, Metric::Writes), "1 | 1");
        assert_eq!(state.cell_text(&rec11, Metric::MemstoreSizeMB), "112233MB | 0MB");
        assert!(state.is_record_changed(&rec11));
        assert!(state.is_value_changed(&rec11, Metric::Writes));
        assert!(!state.is_value_changed(&rec11, Metric::MemstoreSizeMB));
    }

    #[test]
    fn diff_from_previous_rotates_every_iteration() {
        let mut state = LoadState::new(Level::Table);
        let a = key("a");
        state.apply_at(batch(&[("a", reads(10))]), 1_000);
        state.apply_at(batch(&[("a", reads(15))]), 2_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "5");
        state.apply_at(batch(&[("a", reads(17))]), 3_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "2");
    }

    #[test]
    fn toggle_diff_from_start_freezes_generation_current_at_toggle() {
        let mut state = LoadState::new(Level::Table);
        let a = key("a");
        state.apply_at(batch(&[("a", reads(10))]), 1_000);
        state.apply_at(batch(&[("a", reads(20))]), 2_000);
        assert!(state.toggle_diff_from_start());
        // Diffs shown before the next iteration are still against the previous one.
        assert_eq!(state.value_diff(&a, Metric::Reads), "10");

        state.apply_at(batch(&[("a", reads(25))]), 3_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "5");
        state.apply_at(batch(&[("a", reads(40))]), 4_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "20");
        assert_eq!(state.baseline_timestamp(), 2_000);
        assert_eq!(state.elapsed_millis(), 2_000);

        assert!(!state.toggle_diff_from_start());
        state.apply_at(batch(&[("a", reads(41))]), 5_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "1");
    }

    #[test]
    fn reset_makes_next_iteration_its_own_baseline() {
        let mut state = LoadState::new(Level::Table);
        let a = key("a");
        state.apply_at(batch(&[("a", reads(10))]), 1_000);
        state.toggle_diff_from_start();
        state.apply_at(batch(&[("a", reads(20))]), 2_000);
        state.apply_at(batch(&[("a", reads(30))]), 3_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "20");

        state.reset_diff_start_point();
        state.apply_at(batch(&[("a", reads(35))]), 4_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "N/A");
        assert_eq!(state.elapsed_millis(), 0);
        assert!(state.changed_entities().is_empty());

        state.apply_at(batch(&[("a", reads(36))]), 5_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "1");
        state.apply_at(batch(&[("a", reads(40))]), 6_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "5");
        assert_eq!(state.baseline_timestamp(), 4_000);
    }

    #[test]
    fn change_map_is_idempotent() {
        let mut state = LoadState::new(Level::Table);
        state.apply_at(batch(&[("a", reads(1)), ("b", reads(1))]), 1_000);
        state.apply_at(batch(&[("a", reads(2)), ("b", reads(1))]), 2_000);
        let entities = state.changed_entities().clone();
        let summary = state.changed_summary_metrics().clone();
        state.update_change_map();
        assert_eq!(state.changed_entities(), &entities);
        assert_eq!(state.changed_summary_metrics(), &summary);
        assert_eq!(entities.into_iter().collect::<Vec<_>>(), vec![key("a")]);
        assert!(state.is_summary_changed(Metric::Reads));
        assert!(!state.is_summary_changed(Metric::Writes));
    }

    #[test]
    fn toggles_do_not_recompute_changes() {
        let mut state = LoadState::new(Level::Table);
        state.apply_at(batch(&[("a", reads(1))]), 1_000);
        state.apply_at(batch(&[("a", reads(2))]), 2_000);
        let before = state.changed_entities().clone();
        state.toggle_diff_from_start();
        state.toggle_show_rate();
        state.toggle_show_changed_only();
        assert_eq!(state.changed_entities(), &before);
    }

    #[test]
    fn metric_appearing_counts_as_change() {
        let mut state = LoadState::new(Level::Table);
        let a = key("a");
        state.apply_at(batch(&[("a", reads(1))]), 1_000);
        state.apply_at(batch(&[("a", reads(1).with(Metric::Files, 3))]), 2_000);
        assert!(state.is_value_changed(&a, Metric::Files));
        assert_eq!(state.value_diff(&a, Metric::Files), "N/A");
    }

    #[test]
    fn new_entity_is_not_marked_changed() {
        let mut state = LoadState::new(Level::Table);
        state.apply_at(batch(&[("a", reads(1))]), 1_000);
        state.apply_at(batch(&[("a", reads(1)), ("b", reads(7))]), 2_000);
        assert!(!state.is_record_changed(&key("b")));
        assert!(state.is_summary_changed(Metric::Reads));
    }

    #[test]
    fn default_sort_is_natural_and_repeatable() {
        let mut state = LoadState::new(Level::Table);
        state.apply_at(
            batch(&[("c", reads(1)), ("a", reads(3)), ("b", reads(2))]),
            1_000,
        );
        let first: Vec<EntityKey> = state.sorted_entities().into_iter().cloned().collect();
        let second: Vec<EntityKey> = state.sorted_entities().into_iter().cloned().collect();
        assert_eq!(first, vec![key("a"), key("b"), key("c")]);
        assert_eq!(first, second);
    }

    #[test]
    fn value_sort_is_ascending_with_key_tiebreak() {
        let mut state = LoadState::new(Level::Table);
        state.apply_at(
            batch(&[("d", reads(2)), ("a", reads(3)), ("c", reads(1)), ("b", reads(2))]),
            1_000,
        );
        state.sort_by_token("1").unwrap();
        let order: Vec<&str> = state.sorted_entities().iter().map(|e| e.as_str()).collect();
        assert_eq!(order, ["c", "b", "d", "a"]);

        let sorted = state.sorted_entities();
        for pair in sorted.windows(2) {
            let (x, y) = (pair[0], pair[1]);
            assert_ne!(
                Metric::Reads.compare_opt(
                    state.current().value(x, Metric::Reads),
                    state.current().value(y, Metric::Reads)
                ),
                Ordering::Greater
            );
        }
    }

    #[test]
    fn diff_sort_ranks_by_delta() {
        let mut state = LoadState::new(Level::Table);
        state.apply_at(batch(&[("a", reads(100)), ("b", reads(0)), ("c", reads(50))]), 1_000);
        state.apply_at(batch(&[("a", reads(101)), ("b", reads(30)), ("c", reads(60))]), 2_000);
        state.sort_by_token("!").unwrap();
        let order: Vec<&str> = state.sorted_entities().iter().map(|e| e.as_str()).collect();
        assert_eq!(order, ["a", "c", "b"]);
        assert_eq!(state.sort_description(), "Reads (diff)");
    }

    #[test]
    fn ratio_sort_uses_ratio() {
        let mut state = LoadState::new(Level::Server);
        state.apply_at(
            batch(&[
                ("rs1", Sample::new().with_ratio(Metric::DataLocality, 100.0, 0.9)),
                ("rs2", Sample::new().with_ratio(Metric::DataLocality, 1.0, 0.2)),
            ]),
            1_000,
        );
        state.set_sort_spec(SortSpec::by_value(Metric::DataLocality));
        let order: Vec<&str> = state.sorted_entities().iter().map(|e| e.as_str()).collect();
        assert_eq!(order, ["rs2", "rs1"]);
    }

    #[test]
    fn unknown_sort_token_keeps_sort() {
        let mut state = LoadState::new(Level::Table);
        state.sort_by_token("2").unwrap();
        assert!(state.sort_by_token("x").is_err());
        assert_eq!(state.sort_spec(), SortSpec::by_value(Metric::Writes));
    }

    #[test]
    fn sorting_does_not_mutate_samples() {
        let mut state = LoadState::new(Level::Table);
        state.apply_at(batch(&[("b", reads(1)), ("a", reads(2))]), 1_000);
        let before = state.current().clone();
        state.sort_by_token("1").unwrap();
        let _ = state.sorted_entities();
        assert_eq!(state.current(), &before);
    }

    #[test]
    fn show_changed_only_filters_visible_rows() {
        let mut state = LoadState::new(Level::Table);
        state.apply_at(batch(&[("a", reads(1)), ("b", reads(1))]), 1_000);
        state.apply_at(batch(&[("a", reads(1)), ("b", reads(2))]), 2_000);
        assert_eq!(state.visible_entities().len(), 2);
        state.toggle_show_changed_only();
        let visible: Vec<&str> = state.visible_entities().iter().map(|e| e.as_str()).collect();
        assert_eq!(visible, ["b"]);
    }

    #[test]
    fn rate_mode_scales_by_elapsed() {
        let mut state = LoadState::new(Level::Table);
        let a = key("a");
        state.apply_at(batch(&[("a", reads(0))]), 10_000);
        state.apply_at(batch(&[("a", reads(50))]), 20_000);
        assert!(state.toggle_show_rate());
        assert_eq!(state.value_diff(&a, Metric::Reads), "5.0/s");
        assert_eq!(state.summary_diff(Metric::Reads), "5.0/s");
    }

    #[test]
    fn locality_diff_and_rate() {
        let mut state = LoadState::new(Level::Server);
        let rs = key("rs1");
        state.apply_at(batch(&[("rs1", Sample::new().with_ratio(Metric::DataLocality, 1.0, 0.5))]), 0);
        state.apply_at(
            batch(&[("rs1", Sample::new().with_ratio(Metric::DataLocality, 1.0, 0.75))]),
            10_000,
        );
        assert_eq!(state.value_diff(&rs, Metric::DataLocality), "25.00%");
        state.toggle_show_rate();
        assert_eq!(state.value_diff(&rs, Metric::DataLocality), "2.50%/s");
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut state = LoadState::new(Level::Table);
        state.apply_at(batch(&[("a", reads(1))]), 5_000);
        state.apply_at(batch(&[("a", reads(2))]), 4_000);
        assert_eq!(state.iteration_timestamp(), 5_000);
        assert_eq!(state.elapsed_millis(), 0);
    }

    #[test]
    fn install_baseline_enables_diff_from_start() {
        let mut state = LoadState::new(Level::Table);
        let a = key("a");
        state.apply_at(batch(&[("a", reads(10))]), 2_000);
        state.install_baseline(Generation::from_samples([(key("a"), reads(4))], 1_000));
        assert!(state.is_diff_from_start());
        assert_eq!(state.value_diff(&a, Metric::Reads), "6");
        assert!(state.is_record_changed(&a));

        state.apply_at(batch(&[("a", reads(12))]), 3_000);
        assert_eq!(state.value_diff(&a, Metric::Reads), "8");
    }

    #[test]
    fn summary_diff_for_locality() {
        let mut state = LoadState::new(Level::Server);
        state.apply_at(
            batch(&[
                ("a", Sample::new().with_ratio(Metric::DataLocality, 1.0, 0.5)),
                ("b", Sample::new().with_ratio(Metric::DataLocality, 0.0, 0.0)),
            ]),
            1_000,
        );
        assert_eq!(
            state.summary().get(Metric::DataLocality),
            Some(&Value::Ratio(RatioValue::new(1.0, 0.5)))
        );
        assert_eq!(state.summary_cell_text(Metric::DataLocality), "50.00%");
    }

    #[test]
    fn update_rejects_source_at_other_level() {
        let mut state = LoadState::new(Level::Server);
        let mut tables = crate::sources::SyntheticSource::new(Level::Table, 2, 9);
        let err = state.update(&mut tables).unwrap_err();
        assert!(matches!(
            err,
            Error::LevelMismatch {
                found: Level::Table,
                expected: Level::Server
            }
        ));
        assert_eq!(err.to_string(), "source reports table rows, dashboard shows server");
        assert_eq!(state.iterations(), 0);

        let mut servers = crate::sources::SyntheticSource::new(Level::Server, 2, 9);
        state.update(&mut servers).unwrap();
        assert_eq!(state.current().len(), 2);
    }
}
