// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod output;
mod record;

// Re-export all public types
pub use config::{
    BreakdownSpec, ColumnSpec, Config, CounterSpec, CrawlerConfig, DetailConfig, ExportFormat,
    GroupSpec, HarvestConfig, PathsConfig, ResumeConfig, ResumeMode, SourceConfig,
};
pub use output::{OutputSet, OutputSnapshot};
pub use record::{FieldValue, Fields, Record};
