//! Built-in load sources.

pub mod replay;
pub mod synthetic;

pub use replay::ReplaySource;
pub use synthetic::SyntheticSource;

use std::path::PathBuf;

use crate::entity::Level;
use crate::error::Result;
use crate::source::LoadSource;

/// Which built-in source to construct.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// Seeded random load for `entities` units.
    Synthetic { entities: usize, seed: u64 },
    /// Iterations read back from a CSV log.
    Replay { path: PathBuf },
}

impl Default for SourceKind {
    fn default() -> Self {
        Self::Synthetic {
            entities: 12,
            seed: 42,
        }
    }
}

/// Build a boxed source. A replayed log reports its own level; `level` only
/// applies to synthetic load.
pub fn open_source(
    kind: &SourceKind,
    level: Level,
    entity_filter: Option<&str>,
) -> Result<Box<dyn LoadSource>> {
    let source: Box<dyn LoadSource> = match kind {
        SourceKind::Synthetic { entities, seed } => Box::new(
            SyntheticSource::new(level, *entities, *seed).with_filter(entity_filter),
        ),
        SourceKind::Replay { path } => {
            Box::new(ReplaySource::open(path)?.with_filter(entity_filter))
        }
    };
    log::debug!("opened source {} ({})", source.name(), source.level());
    Ok(source)
}
