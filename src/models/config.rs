//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Per-record pacing and time budgets
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Resume strategy
    #[serde(default)]
    pub resume: ResumeConfig,

    /// Output and checkpoint locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Listing table layout
    #[serde(default)]
    pub source: SourceConfig,

    /// Detail page extraction rules
    #[serde(default)]
    pub detail: DetailConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or return the defaults if the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.harvest.fetch_timeout_secs == 0 {
            return Err(AppError::validation(
                "harvest.fetch_timeout_secs must be > 0",
            ));
        }
        if self.paths.output_file.trim().is_empty() {
            return Err(AppError::validation("paths.output_file is empty"));
        }
        if self.paths.checkpoint_file.trim().is_empty() {
            return Err(AppError::validation("paths.checkpoint_file is empty"));
        }
        if self.paths.checkpoint_file == self.paths.output_file {
            return Err(AppError::validation(
                "paths.checkpoint_file must differ from paths.output_file",
            ));
        }

        url::Url::parse(&self.source.start_url)
            .map_err(|e| AppError::validation(format!("source.start_url: {e}")))?;
        check_selector(&self.source.row_selector)?;
        if let Some(next) = self.source.next_selector() {
            check_selector(next)?;
        }
        if let Some(header) = &self.source.header_columns {
            check_selector(header)?;
        }
        if self.source.key_field.trim().is_empty() {
            return Err(AppError::validation("source.key_field is empty"));
        }
        if self.source.min_cells <= self.source.key_column {
            return Err(AppError::validation(
                "source.min_cells must cover source.key_column",
            ));
        }
        if let Some(column) = self
            .source
            .columns
            .iter()
            .find(|c| c.index >= self.source.min_cells)
        {
            return Err(AppError::validation(format!(
                "column '{}' index {} is outside source.min_cells",
                column.name, column.index
            )));
        }

        if self.detail.enabled {
            for counter in &self.detail.counters {
                check_selector(&counter.selector)?;
            }
            if let Some(breakdown) = &self.detail.breakdown {
                check_selector(&breakdown.item_selector)?;
                check_selector(&breakdown.count_selector)?;
            }
            for group in &self.detail.groups {
                check_selector(&group.block_selector)?;
                check_selector(&group.counter_selector)?;
                if group.names.is_empty() {
                    return Err(AppError::validation(format!(
                        "detail group '{}' declares no field names",
                        group.block_selector
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_selector(selector: &str) -> Result<()> {
    scraper::Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| AppError::selector(selector, format!("{e:?}")))
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a failed page load
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base backoff between attempts, multiplied by the attempt number
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
        }
    }
}

/// Harvest loop pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Upper bound for a single detail fetch, retries included
    #[serde(default = "defaults::fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Delay after each saved record and each page advance
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: defaults::fetch_timeout(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// How a restarted run finds where to continue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    /// Skip every listed record up to and including the checkpointed key.
    Positional,
    /// Skip every key already present in the output.
    #[default]
    KeySet,
}

impl std::str::FromStr for ResumeMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "positional" => Ok(ResumeMode::Positional),
            "key_set" | "keyset" => Ok(ResumeMode::KeySet),
            other => Err(AppError::config(format!("unknown resume mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeConfig {
    #[serde(default)]
    pub mode: ResumeMode,
}

/// Tabular export flavor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
}

impl ExportFormat {
    pub fn separator(self) -> char {
        match self {
            ExportFormat::Csv => ',',
            ExportFormat::Tsv => '\t',
        }
    }
}

/// Storage locations. File names are relative to `storage_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::storage_dir")]
    pub storage_dir: PathBuf,

    #[serde(default = "defaults::output_file")]
    pub output_file: String,

    #[serde(default = "defaults::checkpoint_file")]
    pub checkpoint_file: String,

    /// Spreadsheet mirror rewritten with every output write
    #[serde(default = "defaults::export_file")]
    pub export_file: Option<String>,

    #[serde(default)]
    pub export_format: ExportFormat,
}

impl PathsConfig {
    /// Export file name; an empty string disables the export.
    pub fn export_file(&self) -> Option<&str> {
        self.export_file.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            storage_dir: defaults::storage_dir(),
            output_file: defaults::output_file(),
            checkpoint_file: defaults::checkpoint_file(),
            export_file: defaults::export_file(),
            export_format: ExportFormat::default(),
        }
    }
}

/// A listing table column copied into every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Zero-based `td` index
    pub index: usize,
    /// Take the cell's link target instead of its text
    #[serde(default)]
    pub link: bool,
}

/// Listing page layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "defaults::start_url")]
    pub start_url: String,

    /// CSS selector for listing rows
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// Rows with fewer cells are ignored
    #[serde(default = "defaults::min_cells")]
    pub min_cells: usize,

    /// Cell holding the record link, used as the key
    #[serde(default = "defaults::key_column")]
    pub key_column: usize,

    /// Field name under which the key is stored
    #[serde(default = "defaults::key_field")]
    pub key_field: String,

    /// Use the key cell's text when it holds no link; such rows are
    /// skipped otherwise
    #[serde(default)]
    pub key_text_fallback: bool,

    #[serde(default = "defaults::columns")]
    pub columns: Vec<ColumnSpec>,

    /// Header cells naming every column not listed in `columns`,
    /// e.g. `"#dtable thead th"`
    #[serde(default)]
    pub header_columns: Option<String>,

    /// Rows with this class start a new group instead of being records
    #[serde(default)]
    pub group_row_class: Option<String>,

    #[serde(default = "defaults::group_field")]
    pub group_field: String,

    /// Element linking to the next listing page
    #[serde(default = "defaults::next_selector")]
    pub next_selector: Option<String>,

    /// Class marking the next-page element as inactive
    #[serde(default = "defaults::disabled_class")]
    pub disabled_class: String,
}

impl SourceConfig {
    /// Pagination selector; an empty string disables pagination.
    pub fn next_selector(&self) -> Option<&str> {
        self.next_selector.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            start_url: defaults::start_url(),
            row_selector: defaults::row_selector(),
            min_cells: defaults::min_cells(),
            key_column: defaults::key_column(),
            key_field: defaults::key_field(),
            key_text_fallback: false,
            columns: defaults::columns(),
            header_columns: None,
            group_row_class: None,
            group_field: defaults::group_field(),
            next_selector: defaults::next_selector(),
            disabled_class: defaults::disabled_class(),
        }
    }
}

/// A single integer counter on the detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterSpec {
    pub name: String,
    pub selector: String,
}

/// A list of labelled counters, one field per item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownSpec {
    pub item_selector: String,
    pub count_selector: String,
}

/// A block whose counters map positionally onto `names`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub block_selector: String,
    pub counter_selector: String,
    pub names: Vec<String>,
}

/// Detail page extraction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailConfig {
    /// When false, records carry listing fields only
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::counters")]
    pub counters: Vec<CounterSpec>,

    #[serde(default = "defaults::breakdown")]
    pub breakdown: Option<BreakdownSpec>,

    #[serde(default = "defaults::groups")]
    pub groups: Vec<GroupSpec>,

    /// Store the page's visible text under this field
    #[serde(default)]
    pub summary_field: Option<String>,
}

impl DetailConfig {
    /// Field names that are always present as integers, defaulting to zero.
    pub fn numeric_fields(&self) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        self.counters
            .iter()
            .map(|c| c.name.clone())
            .chain(self.groups.iter().flat_map(|g| g.names.iter().cloned()))
            .collect()
    }
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            counters: defaults::counters(),
            breakdown: defaults::breakdown(),
            groups: defaults::groups(),
            summary_field: None,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{BreakdownSpec, ColumnSpec, CounterSpec, GroupSpec};

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; harvester/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        2
    }
    pub fn retry_backoff() -> u64 {
        1000
    }

    // Harvest defaults
    pub fn fetch_timeout() -> u64 {
        120
    }
    pub fn request_delay() -> u64 {
        2000
    }

    // Path defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn output_file() -> String {
        "output.json".into()
    }
    pub fn checkpoint_file() -> String {
        "checkpoint.txt".into()
    }
    pub fn export_file() -> Option<String> {
        Some("output.csv".into())
    }

    // Source defaults (IRINS institute directory)
    pub fn start_url() -> String {
        "https://irins.org/instances".into()
    }
    pub fn row_selector() -> String {
        "#orgTable tbody tr".into()
    }
    pub fn min_cells() -> usize {
        6
    }
    pub fn key_column() -> usize {
        5
    }
    pub fn key_field() -> String {
        "Institute URL".into()
    }
    pub fn columns() -> Vec<ColumnSpec> {
        ["AISHE Code", "Institute Name", "Institute Type", "District", "State / UT"]
            .iter()
            .enumerate()
            .map(|(index, name)| ColumnSpec {
                name: name.to_string(),
                index,
                link: false,
            })
            .collect()
    }
    pub fn group_field() -> String {
        "Category".into()
    }
    pub fn next_selector() -> Option<String> {
        Some("#orgTable_next".into())
    }
    pub fn disabled_class() -> String {
        "disabled".into()
    }

    // Detail defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn counters() -> Vec<CounterSpec> {
        [
            ("Total Faculty / Scientist", "#total_f"),
            ("Total Publications", "#total_p"),
            ("Total Patents", "#total_patent"),
        ]
        .iter()
        .map(|(name, selector)| CounterSpec {
            name: name.to_string(),
            selector: selector.to_string(),
        })
        .collect()
    }
    pub fn breakdown() -> Option<BreakdownSpec> {
        Some(BreakdownSpec {
            item_selector: "ul.reseacher-box-ul li".into(),
            count_selector: "span.counter-home".into(),
        })
    }
    pub fn groups() -> Vec<GroupSpec> {
        vec![GroupSpec {
            block_selector: "div.service-block-v3.service-block-sea".into(),
            counter_selector: "span.counter".into(),
            names: vec![
                "Google Scholar Citations".into(),
                "Scopus Citations".into(),
            ],
        }]
    }
}
