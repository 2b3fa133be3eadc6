//! Local filesystem index store.
//!
//! Keeps one JSON file per document for development and event replays.
//! Production deployments should use the elastic backend.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── cms-ci/ci/{ciId}.json           # CI search documents
//! ├── cms-event/ci/{sha256}.json      # Event projections (create-only)
//! └── cms-2019.11/workorder/*.json    # Work orders (any index matching the pattern)
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::IndexConfig;
use crate::storage::{IndexStore, WorkOrderQuery};
use crate::utils::content_id;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
    index: IndexConfig,
}

impl LocalStore {
    /// Create a LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, index: IndexConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            index,
        }
    }

    /// Path of a document file, rejecting segments that would escape the root.
    fn path(&self, index: &str, kind: &str, id: &str) -> Result<PathBuf> {
        for segment in [index, kind, id] {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['/', '\\'])
            {
                return Err(AppError::validation(format!(
                    "invalid path segment {segment:?}"
                )));
            }
        }
        Ok(self
            .root_dir
            .join(index)
            .join(kind)
            .join(format!("{id}.json")))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir(path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match self.read_bytes(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Drop a work order into `{index}/{work_order_kind}/`, as the work order
    /// producer would.
    pub async fn put_work_order(&self, index: &str, id: &str, source: &Value) -> Result<()> {
        let path = self.path(index, &self.index.work_order_kind, id)?;
        self.write_bytes(&path, &serde_json::to_vec_pretty(source)?)
            .await
    }

    /// Index directories under the root whose name matches the work order pattern.
    async fn work_order_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(AppError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if matches_pattern(&self.index.work_order_pattern, &name.to_string_lossy()) {
                dirs.push(entry.path().join(&self.index.work_order_kind));
            }
        }
        Ok(dirs)
    }
}

/// Match an index name against a pattern with an optional trailing `*`.
fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

#[async_trait]
impl IndexStore for LocalStore {
    async fn index(&self, kind: &str, id: &str, body: &str) -> Result<()> {
        // reject what a real index would reject
        let _: Value = serde_json::from_str(body)?;
        let path = self.path(&self.index.ci_index, kind, id)?;
        self.write_bytes(&path, body.as_bytes()).await
    }

    async fn index_event(&self, channel: &str, body: &str) -> Result<()> {
        let _: Value = serde_json::from_str(body)?;
        let id = content_id(channel, body);
        let path = self.path(&self.index.event_index, channel, &id)?;
        if tokio::fs::try_exists(&path).await? {
            log::debug!("Event {} already stored, keeping first copy", id);
            return Ok(());
        }
        self.write_bytes(&path, body.as_bytes()).await
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Option<Value>> {
        let path = self.path(&self.index.ci_index, kind, id)?;
        self.read_json(&path).await
    }

    async fn search_work_orders(&self, query: &WorkOrderQuery) -> Result<Vec<Value>> {
        let mut sources = Vec::new();
        for dir in self.work_order_dirs().await? {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(AppError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match self.read_json::<Value>(&path).await {
                    Ok(Some(source)) => sources.push(source),
                    Ok(None) => {}
                    Err(e) => log::warn!("Skipping unreadable work order {:?}: {}", path, e),
                }
            }
        }
        Ok(query.select(&sources))
    }
}
