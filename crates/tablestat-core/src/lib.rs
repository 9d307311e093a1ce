//! # tablestat-core
//!
//! **Live, diffable load tables for a region-partitioned storage cluster.**
//!
//! `tablestat-core` samples per-entity load counters (reads, writes, store
//! file sizes, data locality, ...) at a fixed interval, keeps the latest
//! generation next to a baseline, and answers what changed, by how much and
//! how fast. Entities are region servers, tables or regions.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tablestat_core::{Level, LoadState, SyntheticSource};
//!
//! let mut source = SyntheticSource::new(Level::Table, 8, 42);
//! let mut state = LoadState::new(Level::Table);
//! state.update(&mut source).unwrap();
//! state.update(&mut source).unwrap();
//!
//! for entity in state.sorted_entities() {
//!     println!("{entity}: {}", state.cell_text(entity, tablestat_core::Metric::Reads));
//! }
//! ```
//!
//! ## Architecture
//!
//! Source → Batch → LoadState (prepare → ingest → change map) → renderers
//!
//! Two diff modes:
//! - **From previous** (default): every iteration is compared with the one before.
//! - **From start**: diffs are taken against a frozen baseline, captured on
//!   toggle, after a reset, or loaded from a saved CSV file.
//!
//! Every source implements [`LoadSource`]. The [`Monitor`] wraps one
//! [`LoadState`] in a mutex and runs the poll loop and the command set that
//! the terminal and HTTP front ends share.

pub mod entity;
pub mod error;
pub mod metric;
pub mod monitor;
pub mod persist;
pub mod sample;
pub mod sort;
pub mod source;
pub mod sources;
pub mod state;
pub mod value;

pub use entity::{EntityKey, Level};
pub use error::{Error, Result, SourceError};
pub use metric::{Metric, MetricKind, NOT_AVAILABLE};
pub use monitor::{Command, Monitor, MonitorConfig};
pub use persist::{CsvLog, SavedFile, SnapshotStore, derive_file_name, derive_prefix};
pub use sample::{Generation, Sample};
pub use sort::{SortMode, SortSpec};
pub use source::{Batch, LoadSource};
pub use sources::{ReplaySource, SourceKind, SyntheticSource, open_source};
pub use state::{Flags, LoadState};
pub use value::{RatioValue, Value};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
