// src/pipeline/run.rs

//! Entry points wiring configuration, HTTP services and storage together.

use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::{Config, ExportFormat};
use crate::pipeline::harvest::{HarvestOptions, HarvestReport, Harvester};
use crate::services::{PageDetailFetcher, TableEnumerator};
use crate::source::{DetailFetcher, ListingOnly};
use crate::storage::{HarvestStorage, LocalStorage};
use crate::utils::http::{self, RetryPolicy};

/// Persisted progress as seen by `status`.
#[derive(Debug, Clone)]
pub struct HarvestStatus {
    pub checkpoint: Option<String>,
    pub record_count: usize,
    pub column_count: usize,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Run a full harvest over HTTP as configured.
pub async fn run_harvest(config: &Config, storage: &dyn HarvestStorage) -> Result<HarvestReport> {
    config.validate()?;

    let client = http::create_client(&config.crawler)?;
    let retry = RetryPolicy::from_config(&config.crawler);

    log::info!("Harvesting listing at {}", config.source.start_url);

    let mut source = TableEnumerator::new(client.clone(), config.source.clone(), retry);
    let fetcher: Box<dyn DetailFetcher> = if config.detail.enabled {
        Box::new(PageDetailFetcher::new(client, config.detail.clone(), retry))
    } else {
        log::info!("Detail pages disabled, keeping listing fields only");
        Box::new(ListingOnly)
    };

    let harvester = Harvester::new(storage, HarvestOptions::from_config(config));
    harvester.run(&mut source, fetcher.as_ref()).await
}

/// Read the persisted checkpoint and Output Set summary.
pub async fn load_status(storage: &dyn HarvestStorage) -> Result<HarvestStatus> {
    let snapshot = storage.load_output().await?;
    let checkpoint = storage.load_checkpoint().await?;
    Ok(HarvestStatus {
        checkpoint,
        record_count: snapshot.as_ref().map_or(0, |s| s.records.len()),
        column_count: snapshot.as_ref().map_or(0, |s| s.columns.len()),
        updated_at: snapshot.map(|s| s.updated_at),
    })
}

/// Write a tabular export of the persisted Output Set.
pub async fn run_export(
    storage: &LocalStorage,
    file_name: &str,
    format: ExportFormat,
) -> Result<PathBuf> {
    let snapshot = storage
        .load_output()
        .await?
        .ok_or_else(|| AppError::config("No output found. Run 'harvester run' first"))?;
    let path = storage.write_export(file_name, &snapshot, format).await?;
    log::info!(
        "Exported {} records to {}",
        snapshot.records.len(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fields, OutputSet, Record};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_of_empty_storage() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let status = load_status(&storage).await.unwrap();
        assert!(status.checkpoint.is_none());
        assert_eq!(status.record_count, 0);
        assert!(status.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_export_requires_output() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(run_export(&storage, "out.csv", ExportFormat::Csv).await.is_err());
    }

    #[tokio::test]
    async fn test_export_and_status_after_save() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut output = OutputSet::new();
        output.push(Record::new(
            "https://irins.org/a",
            [("Institute Name", "A")].into_iter().collect::<Fields>(),
        ));
        storage.save_output(&output.snapshot(None)).await.unwrap();
        storage.save_checkpoint("https://irins.org/a").await.unwrap();

        let path = run_export(&storage, "out.csv", ExportFormat::Csv).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Institute Name\nA\n");

        let status = load_status(&storage).await.unwrap();
        assert_eq!(status.record_count, 1);
        assert_eq!(status.checkpoint.as_deref(), Some("https://irins.org/a"));
    }

    #[tokio::test]
    async fn test_run_harvest_rejects_invalid_config() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let mut config = Config::default();
        config.source.start_url = "not a url".into();

        assert!(matches!(
            run_harvest(&config, &storage).await,
            Err(AppError::Validation(_))
        ));
    }
}
