//! Directory-backed store reading JSON files on every call.
//!
//! Layout under the data directory:
//! - `rules/<family>.json`: array of rule records
//! - `actions.json`: array of flattened action records
//!
//! Files are re-read per request so edits made by the authoring UI are
//! picked up without a restart. A missing file reads as an empty list.
//! The store never writes; the authoring side owns these files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use streamcue_core::EventFamily;

use super::{ActionStore, FlatRecord, RuleStore, StoreError};
use crate::schema::{parse_rules, Rule};

/// JSON file store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn rules_path(&self, family: EventFamily) -> PathBuf {
        self.data_dir.join("rules").join(format!("{family}.json"))
    }

    pub fn actions_path(&self) -> PathBuf {
        self.data_dir.join("actions.json")
    }

    /// Read a JSON file, treating a missing file as `null`.
    async fn read_json(path: &Path) -> Result<Value, StoreError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file missing, reading as empty");
                Ok(Value::Null)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RuleStore for FileStore {
    async fn rules_for(&self, family: EventFamily) -> Result<Vec<Rule>, StoreError> {
        let raw = Self::read_json(&self.rules_path(family)).await?;
        Ok(parse_rules(raw))
    }
}

#[async_trait]
impl ActionStore for FileStore {
    async fn all_actions(&self) -> Result<Vec<FlatRecord>, StoreError> {
        let raw = Self::read_json(&self.actions_path()).await?;
        let items = match raw {
            Value::Array(items) => items,
            Value::Null => return Ok(Vec::new()),
            _ => {
                warn!(path = %self.actions_path().display(), "actions file is not an array, ignoring");
                return Ok(Vec::new());
            }
        };

        Ok(items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                Value::Object(record) => Some(record),
                _ => {
                    warn!(index, "skipping non-object action record");
                    None
                }
            })
            .collect())
    }
}
