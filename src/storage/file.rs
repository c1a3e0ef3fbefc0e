use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{TreeRecord, TreeStore};
use crate::error::{StorageError, StorageResult};

/// Writes each tree as `<dir>/<record name>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Store records under `dir` (created on first write).
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    async fn write(&self, name: &str, body: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(name);
        let tmp = self.dir.join(format!(".{}.json.tmp", name));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }
}

#[async_trait]
impl TreeStore for JsonFileStore {
    async fn save(&self, record: &TreeRecord) -> StorageResult<()> {
        let name = record.name();
        let body = serde_json::to_vec_pretty(record)?;

        let path = self
            .write(&name, &body)
            .await
            .map_err(|e| StorageError::WriteFailed {
                name: name.clone(),
                message: e.to_string(),
            })?;

        debug!(path = %path.display(), bytes = body.len(), "Tree record written");
        Ok(())
    }

    async fn load(&self, name: &str) -> StorageResult<Option<TreeRecord>> {
        match tokio::fs::read(self.path_for(name)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with('.') {
                continue;
            }
            if let Some(name) = file_name.strip_suffix(".json") {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
