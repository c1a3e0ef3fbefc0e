//! Persistence of generated trees.
//!
//! After every structural change the generator hands a [`TreeRecord`] to a
//! [`TreeStore`]. Two backends exist: one JSON document per tree on disk
//! ([`JsonFileStore`]) and a SQLite table ([`SqliteStore`]).

mod file;
mod sqlite;

pub use file::JsonFileStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StorageResult;
use crate::tree::{CallRecord, DecisionTree, QuestionDocument};

/// Maximum characters kept from the role and query in a record name.
const NAME_FRAGMENT_LEN: usize = 30;

/// Tree-level metadata of a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    /// Expert role.
    pub role: String,
    /// Initial user query.
    pub query: String,
    /// Generating model.
    pub model: String,
    /// Root creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last structural change.
    pub last_updated: DateTime<Utc>,
}

/// A full snapshot of one tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRecord {
    /// Metadata.
    pub meta: RecordMeta,
    /// Recursive node document.
    pub tree: QuestionDocument,
    /// Every model call, oldest first.
    pub logs: Vec<CallRecord>,
}

impl TreeRecord {
    /// Snapshot a tree.
    pub fn from_tree(tree: &DecisionTree) -> Self {
        Self {
            meta: RecordMeta {
                role: tree.role().to_string(),
                query: tree.query().to_string(),
                model: tree.model().to_string(),
                created_at: tree.created_at(),
                last_updated: tree.last_updated(),
            },
            tree: tree.to_document(),
            logs: tree.logs().to_vec(),
        }
    }

    /// Deterministic record name for this tree.
    pub fn name(&self) -> String {
        record_name(self.meta.created_at, &self.meta.role, &self.meta.query)
    }
}

/// `<%Y%m%d_%H%M%S>_<role>_<query>` with role and query sanitized.
pub fn record_name(created_at: DateTime<Utc>, role: &str, query: &str) -> String {
    format!(
        "{}_{}_{}",
        created_at.format("%Y%m%d_%H%M%S"),
        sanitize(role),
        sanitize(query)
    )
}

/// Replace every non-alphanumeric character with `_` and truncate.
fn sanitize(fragment: &str) -> String {
    fragment
        .chars()
        .take(NAME_FRAGMENT_LEN)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Durable storage for tree records.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Write (or overwrite) the record under its name.
    async fn save(&self, record: &TreeRecord) -> StorageResult<()>;

    /// Read a record by name.
    async fn load(&self, name: &str) -> StorageResult<Option<TreeRecord>>;

    /// Names of all stored records, sorted.
    async fn list(&self) -> StorageResult<Vec<String>>;
}

/// Build the configured backend, or `None` when persistence is disabled.
pub async fn open_store(config: &StorageConfig) -> StorageResult<Option<Arc<dyn TreeStore>>> {
    match config.backend {
        StorageBackend::File => {
            info!(dir = %config.trees_dir.display(), "Using JSON file tree store");
            Ok(Some(Arc::new(JsonFileStore::new(&config.trees_dir))))
        }
        StorageBackend::Sqlite => {
            let store = SqliteStore::new(&config.database).await?;
            info!(path = %config.database.path.display(), "Using SQLite tree store");
            Ok(Some(Arc::new(store)))
        }
        StorageBackend::None => {
            info!("Tree persistence disabled");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::tree::tests::flicker_tree;

    #[test]
    fn test_record_name_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 9).unwrap();
        assert_eq!(
            record_name(at, "Technical Troubleshooter", "Screen flickers!"),
            "20250307_140509_Technical_Troubleshooter_Screen_flickers_"
        );
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "a".repeat(50);
        assert_eq!(sanitize(&long).len(), NAME_FRAGMENT_LEN);
        assert_eq!(sanitize("é/ü"), "___");
    }

    #[test]
    fn test_record_from_tree() {
        let tree = flicker_tree();
        let record = TreeRecord::from_tree(&tree);
        assert_eq!(record.meta.role, "Technical Troubleshooter");
        assert_eq!(record.meta.model, "gpt-test");
        assert_eq!(record.meta.created_at, tree.created_at());
        assert_eq!(record.tree.answers.len(), 2);
        assert!(record.logs.is_empty());
        assert!(record.name().contains("_Technical_Troubleshooter_My_computer_screen"));
    }

    #[test]
    fn test_record_json_keys() {
        let record = TreeRecord::from_tree(&flicker_tree());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["meta"]["createdAt"].is_string());
        assert!(value["meta"]["lastUpdated"].is_string());
        assert_eq!(value["tree"]["type"], "question");
        assert!(value["logs"].as_array().unwrap().is_empty());
    }
}
