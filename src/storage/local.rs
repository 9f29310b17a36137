//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── {output_file}         # JSON snapshot of the Output Set
//! ├── {export_file}         # Optional CSV/TSV mirror
//! └── {checkpoint_file}     # Plain-text last completed key
//! ```
//!
//! Every file is written to a sibling `*.tmp` file, flushed, synced and then
//! renamed over the target, so readers see either the old or the new file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{ExportFormat, OutputSnapshot, PathsConfig};
use crate::storage::{HarvestStorage, table};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    output_key: String,
    checkpoint_key: String,
    export: Option<(String, ExportFormat)>,
}

impl LocalStorage {
    /// Create a LocalStorage rooted at the given directory with default file names.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let paths = PathsConfig::default();
        Self {
            root_dir: root_dir.into(),
            output_key: paths.output_file,
            checkpoint_key: paths.checkpoint_file,
            export: None,
        }
    }

    /// Create a LocalStorage from the `[paths]` configuration section.
    pub fn from_config(paths: &PathsConfig) -> Self {
        Self {
            root_dir: paths.storage_dir.clone(),
            output_key: paths.output_file.clone(),
            checkpoint_key: paths.checkpoint_file.clone(),
            export: paths
                .export_file()
                .map(|file| (file.to_string(), paths.export_format)),
        }
    }

    /// Mirror every output write to a tabular export file.
    pub fn with_export(mut self, key: impl Into<String>, format: ExportFormat) -> Self {
        self.export = Some((key.into(), format));
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let file_name = path
            .file_name()
            .ok_or_else(|| AppError::config(format!("storage key '{key}' has no file name")))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write a tabular rendering of `snapshot` under `key`.
    pub async fn write_export(
        &self,
        key: &str,
        snapshot: &OutputSnapshot,
        format: ExportFormat,
    ) -> Result<PathBuf> {
        let bytes = table::render(&snapshot.columns, &snapshot.records, format);
        self.write_bytes(key, &bytes).await?;
        Ok(self.path(key))
    }
}

#[async_trait]
impl HarvestStorage for LocalStorage {
    async fn load_output(&self) -> Result<Option<OutputSnapshot>> {
        self.read_json(&self.output_key).await
    }

    async fn save_output(&self, snapshot: &OutputSnapshot) -> Result<()> {
        self.write_json(&self.output_key, snapshot).await?;
        if let Some((key, format)) = &self.export {
            self.write_export(key, snapshot, *format).await?;
        }
        Ok(())
    }

    async fn load_checkpoint(&self) -> Result<Option<String>> {
        let Some(bytes) = self.read_bytes(&self.checkpoint_key).await? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| {
            AppError::validation(format!(
                "checkpoint {} is not valid UTF-8: {e}",
                self.checkpoint_key
            ))
        })?;
        let key = text.trim();
        Ok((!key.is_empty()).then(|| key.to_string()))
    }

    async fn save_checkpoint(&self, key: &str) -> Result<()> {
        self.write_bytes(&self.checkpoint_key, key.as_bytes()).await
    }
}
