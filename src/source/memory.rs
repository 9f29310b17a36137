// src/source/memory.rs

//! In-memory enumerator and fetcher.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::Fields;
use crate::source::{DetailFetcher, ListedRecord, SourceEnumerator};

/// Enumerator over pre-built pages.
#[derive(Debug, Default)]
pub struct StaticSource {
    pages: Vec<Vec<ListedRecord>>,
    page: usize,
    opened: bool,
    advances: usize,
}

impl StaticSource {
    pub fn new(pages: Vec<Vec<ListedRecord>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Pages of bare keys with no listing fields.
    pub fn from_keys(pages: &[&[&str]]) -> Self {
        Self::new(
            pages
                .iter()
                .map(|page| {
                    page.iter()
                        .map(|key| ListedRecord::new(*key, Fields::new()))
                        .collect()
                })
                .collect(),
        )
    }

    /// Number of `advance_page` calls so far.
    pub fn advances(&self) -> usize {
        self.advances
    }
}

#[async_trait]
impl SourceEnumerator for StaticSource {
    async fn open(&mut self) -> Result<()> {
        self.page = 0;
        self.opened = true;
        Ok(())
    }

    async fn current_page_records(&mut self) -> Result<Vec<ListedRecord>> {
        if !self.opened {
            return Err(AppError::navigation("static source", "not opened"));
        }
        Ok(self.pages.get(self.page).cloned().unwrap_or_default())
    }

    async fn has_next_page(&mut self) -> Result<bool> {
        Ok(self.page + 1 < self.pages.len())
    }

    async fn advance_page(&mut self) -> Result<()> {
        if self.page + 1 >= self.pages.len() {
            return Err(AppError::navigation(
                format!("page {}", self.page + 2),
                "no such page",
            ));
        }
        self.page += 1;
        self.advances += 1;
        Ok(())
    }
}

/// Fetcher answering from a fixed table and recording every call.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Fields>,
    fail_on: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new(responses: impl IntoIterator<Item = (String, Fields)>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Fail with a navigation error when `key` is fetched.
    pub fn failing_on(mut self, key: impl Into<String>) -> Self {
        self.fail_on = Some(key.into());
        self
    }

    /// Keys fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DetailFetcher for StaticFetcher {
    async fn fetch(&self, key: &str) -> Result<Fields> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(key.to_string());
        }
        if self.fail_on.as_deref() == Some(key) {
            return Err(AppError::navigation(key, "simulated failure"));
        }
        Ok(self.responses.get(key).cloned().unwrap_or_default())
    }
}
