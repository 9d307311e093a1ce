//! CSV persistence: saved baselines and the continuous iteration log.
//!
//! # File format
//!
//! ```text
//! "Region","Timestamp","Reads","Writes",...,"CompactingKVs"
//! "usertable,row0042,1700000000000.abcdef.","1771030200000","120","7",...
//! ```
//!
//! Every field is quoted. Cells hold the metric's canonical form (integers,
//! or `"<weight>:<ratio>"` for ratios) so a reload reproduces the exact
//! values; an empty cell is an absent metric. A file may hold several
//! iterations appended one after another; on load the last row of each
//! entity wins.
//!
//! # Naming
//!
//! Saved files are named `<prefix>_<run start>.csv` where the prefix is
//! derived from the monitored target and the entity filter. All runs against
//! the same target share a prefix, so a new run can list and reload the
//! baselines an earlier run saved.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::entity::{EntityKey, Level};
use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::sample::{Generation, Sample};
use crate::state::LoadState;

const TIMESTAMP_COLUMN: &str = "Timestamp";
const FILE_STEM: &str = "tablestat";

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

/// Name prefix shared by every run against `target` with `entity_filter`.
pub fn derive_prefix(target: &str, entity_filter: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(target.as_bytes());
    hasher.update([0u8]);
    hasher.update(entity_filter.unwrap_or("").as_bytes());
    let digest = hasher.finalize();
    let short: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("{FILE_STEM}_{}_{short}", slug(target))
}

/// File name for one run, deterministic for the lifetime of the process.
pub fn derive_file_name(
    target: &str,
    entity_filter: Option<&str>,
    process_start: SystemTime,
) -> String {
    let since_epoch = process_start
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "{}_{}.csv",
        derive_prefix(target, entity_filter),
        format_iso8601_compact(since_epoch)
    )
}

/// Filesystem-safe rendering of a target descriptor.
fn slug(target: &str) -> String {
    let s: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .take(40)
        .collect();
    if s.is_empty() { "default".to_string() } else { s }
}

// ---------------------------------------------------------------------------
// Snapshot store (save / list / load)
// ---------------------------------------------------------------------------

/// A saved file as offered for reload. `index` is the selector
/// [`SnapshotStore::read_selected`] takes.
#[derive(Debug, Clone, Serialize)]
pub struct SavedFile {
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
}

/// Saves and reloads baselines for one monitoring run.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    prefix: String,
    file_name: String,
}

impl SnapshotStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        target: &str,
        entity_filter: Option<&str>,
        process_start: SystemTime,
    ) -> Self {
        Self {
            dir: dir.into(),
            prefix: derive_prefix(target, entity_filter),
            file_name: derive_file_name(target, entity_filter, process_start),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where [`save`](Self::save) writes during this run.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Append the current generation to this run's file, creating it (with
    /// header) on first use.
    pub fn save(&self, state: &LoadState) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path();
        let mut log = CsvLog::open(&path, state.level())?;
        log.append(state.current())?;
        log::info!(
            "saved {} rows to {}",
            state.current().len(),
            path.display()
        );
        Ok(path)
    }

    /// Saved files with this run's prefix, most recent first.
    pub fn list_saved(&self) -> Result<Vec<SavedFile>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                name.strip_prefix(self.prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('_') && rest.ends_with(".csv"))
            })
            .collect();
        // Run-start timestamps are zero-padded, so name order is time order.
        names.sort_by(|a, b| b.cmp(a));

        Ok(names
            .into_iter()
            .enumerate()
            .map(|(index, name)| SavedFile {
                index,
                path: self.dir.join(&name),
                name,
            })
            .collect())
    }

    /// Resolve a 0-based index selector against [`list_saved`](Self::list_saved).
    pub fn resolve(&self, selector: &str) -> Result<SavedFile> {
        let index: usize = selector
            .trim()
            .parse()
            .map_err(|_| Error::InvalidSelector(selector.to_string()))?;
        let mut saved = self.list_saved()?;
        if index >= saved.len() {
            return Err(Error::SelectorOutOfRange {
                index,
                available: saved.len(),
            });
        }
        Ok(saved.swap_remove(index))
    }

    /// Parse the selected file completely as a baseline for a `level`
    /// dashboard. Nothing is installed; see [`LoadState::install_baseline`].
    pub fn read_selected(&self, selector: &str, level: Level) -> Result<(PathBuf, Generation)> {
        let saved = self.resolve(selector)?;
        let generation = read_generation(&saved.path, level)?;
        log::info!(
            "loaded baseline of {} rows from {}",
            generation.len(),
            saved.path.display()
        );
        Ok((saved.path, generation))
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append-only CSV writer, used both for saves and for the continuous log.
#[derive(Debug)]
pub struct CsvLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvLog {
    /// Open `path` for appending; a new or empty file gets the header row.
    pub fn open(path: impl AsRef<Path>, level: Level) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_new = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);
        if is_new {
            write_header(&mut writer, level)?;
            writer.flush()?;
        }
        Ok(Self { path, writer })
    }

    /// Write one row per entity of `generation`.
    pub fn append(&mut self, generation: &Generation) -> std::io::Result<()> {
        for (entity, sample) in generation.samples() {
            write_row(&mut self.writer, entity, generation.timestamp(), sample)?;
        }
        self.writer.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_header<W: Write>(w: &mut W, level: Level) -> std::io::Result<()> {
    let mut fields = vec![quote(level.column_label()), quote(TIMESTAMP_COLUMN)];
    fields.extend(Metric::ALL.iter().map(|m| quote(m.name())));
    writeln!(w, "{}", fields.join(","))
}

fn write_row<W: Write>(
    w: &mut W,
    entity: &EntityKey,
    timestamp: u64,
    sample: &Sample,
) -> std::io::Result<()> {
    let mut fields = vec![quote(entity.as_str()), quote(&timestamp.to_string())];
    fields.extend(Metric::ALL.iter().map(|m| {
        quote(
            &sample
                .get(*m)
                .map(|v| v.to_canonical_string())
                .unwrap_or_default(),
        )
    }));
    writeln!(w, "{}", fields.join(","))
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// One data row of a saved file.
#[derive(Debug, Clone)]
pub struct CsvRow {
    pub entity: EntityKey,
    pub timestamp: u64,
    pub sample: Sample,
}

/// Parsed contents of a saved file or continuous log.
#[derive(Debug, Clone)]
pub struct CsvFile {
    pub level: Level,
    pub rows: Vec<CsvRow>,
}

impl CsvFile {
    /// Rows grouped by timestamp, oldest first: one batch per logged iteration.
    pub fn iterations(&self) -> Vec<(u64, BTreeMap<EntityKey, Sample>)> {
        let mut grouped: BTreeMap<u64, BTreeMap<EntityKey, Sample>> = BTreeMap::new();
        for row in &self.rows {
            grouped
                .entry(row.timestamp)
                .or_default()
                .insert(row.entity.clone(), row.sample.clone());
        }
        grouped.into_iter().collect()
    }

    /// Last row per entity, folded into a generation stamped with the newest
    /// kept row.
    pub fn latest_generation(&self) -> Generation {
        let mut latest: BTreeMap<EntityKey, (u64, Sample)> = BTreeMap::new();
        for row in &self.rows {
            latest.insert(row.entity.clone(), (row.timestamp, row.sample.clone()));
        }
        let timestamp = latest.values().map(|(ts, _)| *ts).max().unwrap_or(0);
        Generation::from_samples(
            latest.into_iter().map(|(entity, (_, sample))| (entity, sample)),
            timestamp,
        )
    }
}

/// Parse a saved file or log.
pub fn read_csv(path: &Path) -> Result<CsvFile> {
    let text = fs::read_to_string(path)?;
    let csv_error = |line: usize, message: String| Error::Csv {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((header_line, header)) = lines.next() else {
        return Err(csv_error(1, "empty file".to_string()));
    };
    let header = split_record(header).map_err(|m| csv_error(header_line, m))?;
    if header.len() < 2 || header[1] != TIMESTAMP_COLUMN {
        return Err(csv_error(
            header_line,
            format!("expected \"<entity>\",\"{TIMESTAMP_COLUMN}\",... header"),
        ));
    }
    let level = Level::from_column_label(&header[0]).ok_or_else(|| {
        csv_error(header_line, format!("unknown entity column '{}'", header[0]))
    })?;
    let columns: Vec<Option<Metric>> = header[2..]
        .iter()
        .map(|name| {
            let metric = Metric::from_name(name);
            if metric.is_none() {
                log::warn!("{}: ignoring unknown column '{name}'", path.display());
            }
            metric
        })
        .collect();

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let fields = split_record(line).map_err(|m| csv_error(line_no, m))?;
        // A repeated header (concatenated files) starts another block.
        if fields.get(1).map(String::as_str) == Some(TIMESTAMP_COLUMN) {
            continue;
        }
        if fields.len() != header.len() {
            return Err(csv_error(
                line_no,
                format!("expected {} fields, found {}", header.len(), fields.len()),
            ));
        }
        let timestamp: u64 = fields[1]
            .trim()
            .parse()
            .map_err(|_| csv_error(line_no, format!("invalid timestamp '{}'", fields[1])))?;

        let mut sample = Sample::new();
        for (metric, cell) in columns.iter().zip(&fields[2..]) {
            let Some(metric) = metric else { continue };
            if let Some(value) = metric
                .parse_canonical(cell)
                .map_err(|e| csv_error(line_no, format!("{metric}: {e}")))?
            {
                sample.set(*metric, value);
            }
        }
        rows.push(CsvRow {
            entity: EntityKey::new(fields[0].clone()),
            timestamp,
            sample,
        });
    }

    Ok(CsvFile { level, rows })
}

/// Read a file as a baseline for a dashboard at `expected` level.
pub fn read_generation(path: &Path, expected: Level) -> Result<Generation> {
    let file = read_csv(path)?;
    if file.level != expected {
        return Err(Error::Csv {
            path: path.to_path_buf(),
            line: 1,
            message: format!(
                "file holds {} rows, dashboard shows {}",
                file.level.column_label(),
                expected.column_label()
            ),
        });
    }
    Ok(file.latest_generation())
}

/// Split one CSV record. Quoted fields may contain commas and doubled quotes.
fn split_record(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

// ---------------------------------------------------------------------------
// Time helpers
// ---------------------------------------------------------------------------

/// Compact, lexically sortable UTC timestamp with milliseconds.
/// Example: `2026-02-15T013000.250Z`
fn format_iso8601_compact(since_epoch: Duration) -> String {
    let (year, month, day, hour, min, sec) = secs_to_utc(since_epoch.as_secs());
    format!(
        "{:04}-{:02}-{:02}T{:02}{:02}{:02}.{:03}Z",
        year,
        month,
        day,
        hour,
        min,
        sec,
        since_epoch.subsec_millis()
    )
}

/// Convert seconds since Unix epoch to (year, month, day, hour, minute, second) UTC.
/// No leap second handling.
fn secs_to_utc(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let sec = secs % 60;
    let min = (secs / 60) % 60;
    let hour = (secs / 3600) % 24;

    let mut days = secs / 86400;
    let mut year = 1970u64;
    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let months_days: [u64; 12] = if is_leap(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };
    let mut month = 1u64;
    for md in months_days {
        if days < md {
            break;
        }
        days -= md;
        month += 1;
    }

    (year, month, days + 1, hour, min, sec)
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
