// src/source/mod.rs

//! Collaborator seams of the harvester.
//!
//! - [`SourceEnumerator`]: ordered, paginated listing of record keys
//! - [`DetailFetcher`]: resolves one key to its detail fields
//!
//! HTTP implementations live in [`crate::services`]; [`memory`] holds
//! in-process implementations for tests and dry runs.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Fields;

/// One listing row: its key and the fields visible on the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedRecord {
    pub key: String,
    pub fields: Fields,
}

impl ListedRecord {
    pub fn new(key: impl Into<String>, fields: Fields) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }
}

/// Ordered, finite, paginated listing of records.
///
/// Every process invocation enumerates from the first page; the enumerator
/// keeps no progress of its own. The order must be identical across runs
/// for positional resumption to be correct.
#[async_trait]
pub trait SourceEnumerator: Send {
    /// Load the first page.
    async fn open(&mut self) -> Result<()>;

    /// Records on the current page, in listing order.
    async fn current_page_records(&mut self) -> Result<Vec<ListedRecord>>;

    /// Whether another page follows the current one.
    async fn has_next_page(&mut self) -> Result<bool>;

    /// Move to the next page.
    async fn advance_page(&mut self) -> Result<()>;
}

/// Resolves a key to its detail fields.
///
/// Errors are navigation failures and end the run. Fields that cannot be
/// extracted are defaulted by the implementation instead.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Fields>;
}

/// Fetcher for listings without detail pages: every record keeps its
/// listing fields only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingOnly;

#[async_trait]
impl DetailFetcher for ListingOnly {
    async fn fetch(&self, _key: &str) -> Result<Fields> {
        Ok(Fields::new())
    }
}
