//! Seeded random load generator.
//!
//! Stands in for a live cluster: counters (reads, writes, compacted KVs)
//! only grow, sizes drift, locality wanders between 0 and 1 and a few
//! entities sit idle on any given iteration so change highlighting has
//! something to do. The same seed always produces the same sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::entity::{EntityKey, Level};
use crate::error::SourceError;
use crate::metric::Metric;
use crate::sample::Sample;
use crate::source::{Batch, LoadSource, matches_filter};
use crate::value::RatioValue;

/// Chance (in percent) that an entity reports no activity in an iteration.
const IDLE_PERCENT: u32 = 25;

#[derive(Debug, Clone)]
struct Unit {
    key: EntityKey,
    reads: i64,
    writes: i64,
    regions: i64,
    files: i64,
    file_size_mb: i64,
    memstore_mb: i64,
    locality: f64,
    compacted: i64,
    compacting: i64,
}

pub struct SyntheticSource {
    name: String,
    level: Level,
    units: Vec<Unit>,
    rng: StdRng,
    filter: Option<String>,
}

impl SyntheticSource {
    pub fn new(level: Level, entities: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let units = (0..entities.max(1))
            .map(|i| Unit {
                key: entity_name(level, i),
                reads: rng.random_range(0..10_000),
                writes: rng.random_range(0..2_000),
                regions: rng.random_range(1..40),
                files: rng.random_range(1..200),
                file_size_mb: rng.random_range(10..50_000),
                memstore_mb: rng.random_range(0..512),
                locality: rng.random_range(0.5..1.0),
                compacted: 0,
                compacting: 0,
            })
            .collect();
        Self {
            name: format!("synthetic:{level}:{seed}"),
            level,
            units,
            rng,
            filter: None,
        }
    }

    /// Report only entities whose name contains `filter`.
    pub fn with_filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter.map(str::to_string);
        self
    }

    fn step(&mut self) {
        let rng = &mut self.rng;
        for unit in &mut self.units {
            if rng.random_range(0..100) < IDLE_PERCENT {
                continue;
            }
            unit.reads += rng.random_range(0..500);
            unit.writes += rng.random_range(0..120);
            unit.memstore_mb = (unit.memstore_mb + rng.random_range(-16..32)).clamp(0, 1024);
            if rng.random_range(0..10) == 0 {
                // flush
                unit.files += 1;
                unit.file_size_mb += unit.memstore_mb / 2;
                unit.memstore_mb = 0;
            }
            if unit.compacting > 0 {
                let done = unit.compacting.min(rng.random_range(100..5_000));
                unit.compacted += done;
                unit.compacting -= done;
            } else if unit.files > 8 && rng.random_range(0..5) == 0 {
                unit.compacting = unit.files * 1_000;
                unit.files = (unit.files / 2).max(1);
            }
            unit.locality = (unit.locality + rng.random_range(-0.02..0.02)).clamp(0.0, 1.0);
        }
    }

    fn sample(&self, unit: &Unit) -> Sample {
        let regions = match self.level {
            Level::Region => 1,
            _ => unit.regions,
        };
        Sample::new()
            .with(Metric::Reads, unit.reads)
            .with(Metric::Writes, unit.writes)
            .with(Metric::Regions, regions)
            .with(Metric::Files, unit.files)
            .with(Metric::FileSizeMB, unit.file_size_mb)
            .with(Metric::FileSizeUncompMB, unit.file_size_mb * 3)
            .with(
                Metric::DataLocality,
                RatioValue::new(unit.file_size_mb as f64, unit.locality),
            )
            .with(Metric::MemstoreSizeMB, unit.memstore_mb)
            .with(Metric::CompactedKVs, unit.compacted)
            .with(Metric::CompactingKVs, unit.compacting)
    }
}

impl LoadSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> Level {
        self.level
    }

    fn collect(&mut self) -> Result<Batch, SourceError> {
        self.step();
        Ok(self
            .units
            .iter()
            .filter(|u| matches_filter(&u.key, self.filter.as_deref()))
            .map(|u| (u.key.clone(), self.sample(u)))
            .collect())
    }
}

fn entity_name(level: Level, i: usize) -> EntityKey {
    let name = match level {
        Level::Server => format!("rs{:02}.example.com,16020,1700000000000", i + 1),
        Level::Table => format!("table{:02}", i + 1),
        Level::Region => format!(
            "table{:02},row{:04},1700000000000.{:08x}.",
            i % 3 + 1,
            i * 100,
            (i as u32).wrapping_mul(0x9e37_79b9)
        ),
    };
    EntityKey::new(name)
}
