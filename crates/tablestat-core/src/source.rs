//! The data-source contract.
//!
//! A [`LoadSource`] turns whatever the cluster (or a file, or a generator)
//! reports into one complete [`Batch`] per call. The engine never sees a
//! partially collected iteration: either `collect` returns the whole batch or
//! it fails and the engine is not touched.

use std::collections::BTreeMap;

use crate::entity::{EntityKey, Level};
use crate::error::SourceError;
use crate::sample::Sample;

/// One complete iteration: every reporting entity with its sample.
pub type Batch = BTreeMap<EntityKey, Sample>;

pub trait LoadSource: Send {
    /// Descriptor of the monitored target (cluster address, file name, ...).
    fn name(&self) -> &str;

    /// Grouping level of the entities this source reports.
    fn level(&self) -> Level;

    /// Collect one full iteration.
    fn collect(&mut self) -> Result<Batch, SourceError>;

    /// Epoch milliseconds the last collected batch describes, when the source
    /// knows better than the wall clock (e.g. a replayed log).
    fn collected_at(&self) -> Option<u64> {
        None
    }
}

/// Keep only entities whose name contains `filter`. `None` keeps everything.
pub fn matches_filter(entity: &EntityKey, filter: Option<&str>) -> bool {
    filter.is_none_or(|f| entity.as_str().contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_is_substring_match() {
        let e = EntityKey::from("usertable,row0042,1700000000000.abcdef.");
        assert!(matches_filter(&e, None));
        assert!(matches_filter(&e, Some("usertable")));
        assert!(!matches_filter(&e, Some("orders")));
    }
}
