//! Replays a CSV log (written by [`CsvLog`](crate::persist::CsvLog) or a
//! save) one logged iteration per `collect()`.

use std::collections::VecDeque;
use std::path::Path;

use crate::entity::Level;
use crate::error::{Result, SourceError};
use crate::persist::read_csv;
use crate::source::{Batch, LoadSource, matches_filter};

pub struct ReplaySource {
    name: String,
    level: Level,
    pending: VecDeque<(u64, Batch)>,
    last_timestamp: Option<u64>,
    filter: Option<String>,
}

impl ReplaySource {
    /// Parse the whole log up front; a malformed file fails here, not mid-run.
    pub fn open(path: &Path) -> Result<Self> {
        let file = read_csv(path)?;
        let pending: VecDeque<(u64, Batch)> = file.iterations().into_iter().collect();
        log::info!(
            "replaying {} iterations from {}",
            pending.len(),
            path.display()
        );
        Ok(Self {
            name: path.display().to_string(),
            level: file.level,
            pending,
            last_timestamp: None,
            filter: None,
        })
    }

    pub fn with_filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter.map(str::to_string);
        self
    }

    /// Iterations not yet replayed.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl LoadSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> Level {
        self.level
    }

    fn collect(&mut self) -> std::result::Result<Batch, SourceError> {
        let (timestamp, batch) = self.pending.pop_front().ok_or(SourceError::Exhausted)?;
        self.last_timestamp = Some(timestamp);
        let filter = self.filter.as_deref();
        Ok(batch
            .into_iter()
            .filter(|(key, _)| matches_filter(key, filter))
            .collect())
    }

    fn collected_at(&self) -> Option<u64> {
        self.last_timestamp
    }
}
