// src/pipeline/harvest.rs

//! Resumable incremental harvest loop.
//!
//! Each run re-enumerates the source from its first page. Records already
//! completed by an earlier run are skipped, every other record is fetched,
//! appended to the Output Set and persisted immediately: first the Output
//! Set, then the checkpoint. A crash at any point leaves a state the next
//! run resumes from without refetching or duplicating a record.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, OutputSet, Record, ResumeMode};
use crate::source::{DetailFetcher, ListedRecord, SourceEnumerator};
use crate::storage::HarvestStorage;
use crate::utils::fingerprint_keys;

/// Tunables of a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub mode: ResumeMode,
    /// Fields defaulted to zero when a detail page lacks them
    pub numeric_fields: Vec<String>,
    pub fetch_timeout: Duration,
    pub request_delay: Duration,
}

impl HarvestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.resume.mode,
            numeric_fields: config.detail.numeric_fields(),
            fetch_timeout: Duration::from_secs(config.harvest.fetch_timeout_secs),
            request_delay: Duration::from_millis(config.harvest.request_delay_ms),
        }
    }
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            mode: ResumeMode::default(),
            numeric_fields: Vec::new(),
            fetch_timeout: Duration::from_secs(120),
            request_delay: Duration::ZERO,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    /// Checkpoint the run started from
    pub resumed_from: Option<String>,
    pub pages: usize,
    pub seen: usize,
    pub skipped: usize,
    pub fetched: usize,
    /// Output Set size at the end of the run
    pub total: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// State recovered from storage at startup.
struct ResumeState {
    output: OutputSet,
    checkpoint: Option<String>,
    source_digest: Option<String>,
}

/// Drives one harvest run against a storage backend.
pub struct Harvester<'a> {
    storage: &'a dyn HarvestStorage,
    options: HarvestOptions,
}

impl<'a> Harvester<'a> {
    pub fn new(storage: &'a dyn HarvestStorage, options: HarvestOptions) -> Self {
        Self { storage, options }
    }

    /// Load the Output Set and checkpoint, repairing a checkpoint that lags
    /// the output (crash between the two writes).
    async fn recover(&self) -> Result<ResumeState> {
        let snapshot = self.storage.load_output().await?;
        let source_digest = snapshot.as_ref().and_then(|s| s.source_digest.clone());
        let output = snapshot.map(OutputSet::from_snapshot).unwrap_or_default();
        let mut checkpoint = self.storage.load_checkpoint().await?;

        match (output.last_key(), checkpoint.as_deref()) {
            (Some(last), Some(saved)) if last != saved => {
                log::warn!(
                    "Checkpoint '{}' lags the output (last record '{}'), repairing",
                    saved,
                    last
                );
                self.storage.save_checkpoint(last).await?;
                checkpoint = Some(last.to_string());
            }
            (Some(last), None) => {
                log::warn!(
                    "Output has {} records but no checkpoint, using '{}'",
                    output.len(),
                    last
                );
                self.storage.save_checkpoint(last).await?;
                checkpoint = Some(last.to_string());
            }
            (None, Some(saved)) => match self.options.mode {
                ResumeMode::Positional => log::warn!(
                    "Checkpoint '{}' has no saved records, skipping up to it anyway",
                    saved
                ),
                ResumeMode::KeySet => log::warn!(
                    "Checkpoint '{}' has no saved records, skipping up to it by position",
                    saved
                ),
            },
            _ => {}
        }

        Ok(ResumeState {
            output,
            checkpoint,
            source_digest,
        })
    }

    /// Run the harvest until the source is exhausted.
    ///
    /// Fetch and storage errors end the run immediately; everything persisted
    /// before the failure remains valid for the next run.
    pub async fn run(
        &self,
        source: &mut dyn SourceEnumerator,
        fetcher: &dyn DetailFetcher,
    ) -> Result<HarvestReport> {
        let started_at = Utc::now();
        let ResumeState {
            mut output,
            checkpoint,
            source_digest: previous_digest,
        } = self.recover().await?;

        if let Some(key) = &checkpoint {
            log::info!(
                "Resuming after '{}' ({} records saved, {:?} mode)",
                key,
                output.len(),
                self.options.mode
            );
        }

        // Skip everything up to and including this key. Key-set mode only
        // needs it when the checkpoint has no saved records to match against.
        let mut pending_checkpoint = match self.options.mode {
            ResumeMode::Positional => checkpoint.clone(),
            ResumeMode::KeySet if output.is_empty() => checkpoint.clone(),
            ResumeMode::KeySet => None,
        };

        let mut report = HarvestReport {
            resumed_from: checkpoint,
            pages: 0,
            seen: 0,
            skipped: 0,
            fetched: 0,
            total: 0,
            started_at,
            finished_at: started_at,
        };
        let mut source_digest = previous_digest.clone();

        source.open().await?;
        loop {
            let records = source.current_page_records().await?;
            report.pages += 1;

            if report.pages == 1 {
                let digest = fingerprint_keys(records.iter().map(|r| r.key.as_str()));
                if let Some(previous) = &previous_digest {
                    if *previous != digest && !output.is_empty() {
                        log::warn!(
                            "First listing page differs from the previous run; \
                             the source order may have changed"
                        );
                    }
                }
                source_digest = Some(digest);
            }

            log::debug!("Page {}: {} records", report.pages, records.len());

            for listed in records {
                report.seen += 1;
                if skip_record(&listed.key, &mut pending_checkpoint, &output) {
                    report.skipped += 1;
                    continue;
                }

                let record = self.fetch_record(fetcher, listed).await?;
                let key = record.key.clone();
                output.push(record);

                self.storage
                    .save_output(&output.snapshot(source_digest.clone()))
                    .await?;
                self.storage.save_checkpoint(&key).await?;
                report.fetched += 1;

                log::info!("Saved {} ({} records)", key, output.len());
                self.pause().await;
            }

            if !source.has_next_page().await? {
                break;
            }
            source.advance_page().await?;
            self.pause().await;
        }

        if let Some(key) = pending_checkpoint {
            log::warn!(
                "Source exhausted after {} records without reaching checkpoint '{}'; \
                 nothing was harvested",
                report.seen,
                key
            );
            return Err(AppError::CheckpointNotFound { key });
        }

        report.total = output.len();
        report.finished_at = Utc::now();
        log::info!(
            "Harvest complete: {} pages, {} fetched, {} skipped, {} records total",
            report.pages,
            report.fetched,
            report.skipped,
            report.total
        );
        Ok(report)
    }

    /// Fetch details for one listed record within the fetch time budget.
    async fn fetch_record(
        &self,
        fetcher: &dyn DetailFetcher,
        listed: ListedRecord,
    ) -> Result<Record> {
        log::debug!("Fetching {}", listed.key);
        let details = tokio::time::timeout(self.options.fetch_timeout, fetcher.fetch(&listed.key))
            .await
            .map_err(|_| AppError::Timeout {
                key: listed.key.clone(),
                secs: self.options.fetch_timeout.as_secs(),
            })??;

        Ok(Record::new(listed.key, listed.fields)
            .with_details(details)
            .with_zero_defaults(&self.options.numeric_fields))
    }

    async fn pause(&self) {
        if !self.options.request_delay.is_zero() {
            tokio::time::sleep(self.options.request_delay).await;
        }
    }
}

/// Whether `key` was completed by an earlier run (or earlier in this one).
///
/// While a positional checkpoint is pending, every key is skipped; the
/// checkpointed key itself clears it and is skipped as well.
fn skip_record(key: &str, pending_checkpoint: &mut Option<String>, output: &OutputSet) -> bool {
    if let Some(checkpoint) = pending_checkpoint.as_deref() {
        if key == checkpoint {
            *pending_checkpoint = None;
        }
        return true;
    }
    if output.contains(key) {
        log::debug!("Skipping {}, already harvested", key);
        return true;
    }
    false
}
