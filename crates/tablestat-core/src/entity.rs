//! Identity of one monitored grouping unit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which kind of unit the dashboard groups load by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// One row per storage node.
    Server,
    /// One row per table.
    #[default]
    Table,
    /// One row per region (sub-partition of a table).
    Region,
}

impl Level {
    /// Header of the entity column in renders and CSV files.
    pub fn column_label(self) -> &'static str {
        match self {
            Self::Server => "RegionServer",
            Self::Table => "Table",
            Self::Region => "Region",
        }
    }

    pub fn from_column_label(label: &str) -> Option<Level> {
        [Self::Server, Self::Table, Self::Region]
            .into_iter()
            .find(|l| l.column_label() == label)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Table => write!(f, "table"),
            Self::Region => write!(f, "region"),
        }
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "server" | "rs" | "regionserver" => Ok(Self::Server),
            "table" | "t" => Ok(Self::Table),
            "region" | "r" => Ok(Self::Region),
            other => Err(format!("unknown level '{other}' (expected server, table or region)")),
        }
    }
}

/// Opaque identity of an entity (server name, table name or region descriptor).
///
/// Ordering is the byte order of the wrapped name, which is also the default
/// row order of every view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}
