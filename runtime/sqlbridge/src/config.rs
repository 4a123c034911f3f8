///
/// # Bridge Configuration
///
/// A handle can be opened from a TOML file instead of individual calls.
/// Every field has a default, so an empty file opens an in-memory database
/// with map-mode rows and no type translation.
///
/// ## Example sqlbridge.toml
///
/// ```toml
/// [database]
/// path = "queue.db"
/// mode = "read-write-create"   # or "read-write", "read-only"
///
/// [rows]
/// representation = "array"     # or "map"
/// type_translation = true
/// show_datatypes = true
/// ```
///
/// `type_translation` has no effect unless `show_datatypes` is on for the
/// connection.
///

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::database::OpenMode;
use crate::error::{BridgeError, Result};
use crate::row::RowMode;

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub database: DatabaseSection,
    pub rows: RowsSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub path: String,
    pub mode: OpenMode,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            mode: OpenMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RowsSection {
    pub representation: RowMode,
    pub type_translation: bool,
    pub show_datatypes: bool,
}

impl BridgeConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BridgeError::Config(e.to_string()))
    }
}

impl std::str::FromStr for BridgeConfig {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
