// src/services/table.rs

//! HTML table listing enumerator.
//!
//! Walks a paginated table of records, following the "next" control until it
//! is missing, disabled, or points back to an already visited page.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Fields, SourceConfig};
use crate::services::parse_selector;
use crate::source::{ListedRecord, SourceEnumerator};
use crate::utils::http::{self, RetryPolicy};
use crate::utils::{normalize_whitespace, resolve_url};

/// One parsed listing page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub records: Vec<ListedRecord>,
    pub next_url: Option<Url>,
}

/// Enumerates listing rows over HTTP.
pub struct TableEnumerator {
    client: Client,
    config: SourceConfig,
    retry: RetryPolicy,
    current: Option<ListingPage>,
    page_number: usize,
    visited: HashSet<String>,
}

impl TableEnumerator {
    pub fn new(client: Client, config: SourceConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
            current: None,
            page_number: 0,
            visited: HashSet::new(),
        }
    }

    async fn load(&mut self, url: Url) -> Result<()> {
        let html = http::fetch_text(&self.client, url.as_str(), self.retry).await?;
        let mut page = parse_listing(&html, &url, &self.config)?;
        mark_visited(&mut self.visited, &url, &mut page);

        log::debug!(
            "Listing page {} ({}): {} records",
            self.page_number,
            url,
            page.records.len()
        );
        self.current = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&ListingPage> {
        self.current
            .as_ref()
            .ok_or_else(|| AppError::navigation(&self.config.start_url, "listing not opened"))
    }
}

#[async_trait]
impl SourceEnumerator for TableEnumerator {
    async fn open(&mut self) -> Result<()> {
        let start = Url::parse(&self.config.start_url)?;
        self.visited.clear();
        self.page_number = 1;
        self.load(start).await
    }

    async fn current_page_records(&mut self) -> Result<Vec<ListedRecord>> {
        Ok(self.page()?.records.clone())
    }

    async fn has_next_page(&mut self) -> Result<bool> {
        Ok(self.page()?.next_url.is_some())
    }

    async fn advance_page(&mut self) -> Result<()> {
        let next = self.page()?.next_url.clone().ok_or_else(|| {
            AppError::navigation(
                format!("page {}", self.page_number + 1),
                "no next page",
            )
        })?;
        self.page_number += 1;
        self.load(next).await
    }
}

/// Record `url` as visited and drop a next link that points back to a
/// visited page.
fn mark_visited(visited: &mut HashSet<String>, url: &Url, page: &mut ListingPage) {
    visited.insert(url.to_string());
    if let Some(next) = &page.next_url {
        if visited.contains(next.as_str()) {
            log::warn!("Next page {} was already visited, stopping pagination", next);
            page.next_url = None;
        }
    }
}

/// Parse one listing page into records and the next page link.
pub fn parse_listing(html: &str, page_url: &Url, config: &SourceConfig) -> Result<ListingPage> {
    let document = Html::parse_document(html);
    let row_sel = parse_selector(&config.row_selector)?;
    let cell_sel = parse_selector("td")?;
    let header_sel = parse_selector("th")?;
    let link_sel = parse_selector("a")?;

    let headers = match &config.header_columns {
        Some(selector) => header_names(&document, selector)?,
        None => Vec::new(),
    };

    let mut records = Vec::new();
    let mut group: Option<String> = None;

    for row in document.select(&row_sel) {
        if let Some(class) = &config.group_row_class {
            if row.value().classes().any(|c| c == class.as_str()) {
                group = Some(element_text(&row));
                continue;
            }
        }
        if row.select(&header_sel).next().is_some() {
            continue;
        }

        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.len() < config.min_cells {
            continue;
        }

        let Some(key_cell) = cells.get(config.key_column) else {
            continue;
        };
        let key = match cell_link(key_cell, &link_sel, page_url) {
            Some(link) => link,
            None if config.key_text_fallback => element_text(key_cell),
            None => {
                log::warn!(
                    "Skipping listing row without a link in column {} on {}",
                    config.key_column,
                    page_url
                );
                continue;
            }
        };
        if key.is_empty() {
            log::debug!("Skipping listing row without a key on {}", page_url);
            continue;
        }

        let mut fields = Fields::new();
        for column in &config.columns {
            let Some(cell) = cells.get(column.index) else {
                continue;
            };
            let value = if column.link {
                cell_link(cell, &link_sel, page_url).unwrap_or_else(|| element_text(cell))
            } else {
                element_text(cell)
            };
            fields.insert(column.name.clone(), value);
        }
        for (index, name) in headers.iter().enumerate() {
            if name.is_empty()
                || index == config.key_column
                || config.columns.iter().any(|c| c.index == index)
            {
                continue;
            }
            if let Some(cell) = cells.get(index) {
                fields.insert(name.clone(), element_text(cell));
            }
        }
        fields.insert(config.key_field.clone(), key.clone());
        if let Some(label) = &group {
            fields.insert(config.group_field.clone(), label.clone());
        }

        records.push(ListedRecord::new(key, fields));
    }

    let next_url = match config.next_selector() {
        Some(selector) => find_next_url(&document, selector, &config.disabled_class, page_url)?,
        None => None,
    };

    Ok(ListingPage { records, next_url })
}

fn find_next_url(
    document: &Html,
    selector: &str,
    disabled_class: &str,
    page_url: &Url,
) -> Result<Option<Url>> {
    let next_sel = parse_selector(selector)?;
    let link_sel = parse_selector("a")?;

    let Some(control) = document.select(&next_sel).next() else {
        return Ok(None);
    };
    if control.value().classes().any(|c| c == disabled_class) {
        return Ok(None);
    }

    let href = control
        .value()
        .attr("href")
        .or_else(|| {
            control
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
        })
        .map(str::trim)
        .filter(|h| !h.is_empty() && *h != "#" && !h.starts_with("javascript:"));

    Ok(href.and_then(|h| page_url.join(h).ok()))
}

/// Texts of the first header row matched by `selector`.
fn header_names(document: &Html, selector: &str) -> Result<Vec<String>> {
    let sel = parse_selector(selector)?;
    let mut cells = document.select(&sel);
    let Some(first) = cells.next() else {
        return Ok(Vec::new());
    };
    let row = first.parent().map(|p| p.id());
    Ok(std::iter::once(first)
        .chain(cells.filter(|c| c.parent().map(|p| p.id()) == row))
        .map(|c| element_text(&c))
        .collect())
}

fn element_text(element: &ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn cell_link(cell: &ElementRef, link_sel: &scraper::Selector, base: &Url) -> Option<String> {
    cell.select(link_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(|h| resolve_url(base, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnSpec;

    const IRINS_PAGE: &str = r##"
        <table id="orgTable">
          <thead><tr><th>AISHE</th><th>Name</th></tr></thead>
          <tbody>
            <tr>
              <td>U-0001</td><td> Anna   University </td><td>University</td>
              <td>Chennai</td><td>Tamil Nadu</td>
              <td><a href="/profile/anna">View</a></td>
            </tr>
            <tr><td colspan="6">No data</td></tr>
            <tr>
              <td>C-0002</td><td>PSG College</td><td>College</td>
              <td>Coimbatore</td><td>Tamil Nadu</td>
              <td><a href="https://psg.irins.org/">View</a></td>
            </tr>
          </tbody>
        </table>
        <ul><li id="orgTable_next" class="paginate_button next"><a href="?page=2">Next</a></li></ul>
    "##;

    fn page_url() -> Url {
        Url::parse("https://irins.org/instances").unwrap()
    }

    #[test]
    fn test_parse_irins_rows() {
        let page = parse_listing(IRINS_PAGE, &page_url(), &SourceConfig::default()).unwrap();

        assert_eq!(page.records.len(), 2);
        let first = &page.records[0];
        assert_eq!(first.key, "https://irins.org/profile/anna");
        assert_eq!(
            first.fields.get("Institute Name").and_then(|v| v.as_text()),
            Some("Anna University")
        );
        assert_eq!(
            first.fields.get("Institute URL").and_then(|v| v.as_text()),
            Some("https://irins.org/profile/anna")
        );
        let names: Vec<_> = first.fields.names().collect();
        assert_eq!(names.first(), Some(&"AISHE Code"));
        assert_eq!(names.last(), Some(&"Institute URL"));

        assert_eq!(page.records[1].key, "https://psg.irins.org/");
        assert_eq!(
            page.next_url.map(|u| u.to_string()),
            Some("https://irins.org/instances?page=2".to_string())
        );
    }

    #[test]
    fn test_disabled_next_ends_pagination() {
        let html = IRINS_PAGE.replace("paginate_button next", "paginate_button next disabled");
        let page = parse_listing(&html, &page_url(), &SourceConfig::default()).unwrap();
        assert!(page.next_url.is_none());
    }

    #[test]
    fn test_javascript_next_is_not_followed() {
        let html = IRINS_PAGE.replace("?page=2", "javascript:void(0)");
        let page = parse_listing(&html, &page_url(), &SourceConfig::default()).unwrap();
        assert!(page.next_url.is_none());
    }

    #[test]
    fn test_group_rows_label_following_records() {
        let html = r#"
            <table class="table"><tbody>
              <tr class="active"><td>Engineering Colleges</td></tr>
              <tr><td><a href="/scet">SCET</a></td></tr>
              <tr class="active"><td>Arts Colleges</td></tr>
              <tr><td><a href="/mtb">MTB Arts</a></td></tr>
            </tbody></table>
        "#;
        let config = SourceConfig {
            start_url: "https://www.ses-surat.org/pages/colleges/".into(),
            row_selector: "table.table tbody tr".into(),
            min_cells: 1,
            key_column: 0,
            key_field: "URL".into(),
            columns: vec![ColumnSpec {
                name: "College Name".into(),
                index: 0,
                link: false,
            }],
            group_row_class: Some("active".into()),
            next_selector: None,
            ..SourceConfig::default()
        };
        let base = Url::parse(&config.start_url).unwrap();
        let page = parse_listing(html, &base, &config).unwrap();

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].key, "https://www.ses-surat.org/scet");
        assert_eq!(
            page.records[1].fields.get("Category").and_then(|v| v.as_text()),
            Some("Arts Colleges")
        );
        assert!(page.next_url.is_none());
    }

    #[test]
    fn test_link_column_falls_back_to_text() {
        let html = r#"
            <table><tbody>
              <tr><td>1</td><td>Institute A</td><td><a href="http://a.edu">site</a></td></tr>
              <tr><td>2</td><td>Institute B</td><td>www.b.edu</td></tr>
            </tbody></table>
        "#;
        let config = SourceConfig {
            row_selector: "table tbody tr".into(),
            min_cells: 3,
            key_column: 2,
            key_field: "Website".into(),
            key_text_fallback: true,
            columns: vec![ColumnSpec {
                name: "S.No".into(),
                index: 0,
                link: false,
            }],
            next_selector: None,
            ..SourceConfig::default()
        };
        let page = parse_listing(html, &page_url(), &config).unwrap();
        assert_eq!(page.records[0].key, "http://a.edu/");
        assert_eq!(page.records[1].key, "www.b.edu");
    }

    #[test]
    fn test_rows_without_key_link_are_skipped_by_default() {
        let html = IRINS_PAGE.replace(r#"<a href="/profile/anna">View</a>"#, "View");
        let page = parse_listing(&html, &page_url(), &SourceConfig::default()).unwrap();

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].key, "https://psg.irins.org/");
    }

    #[test]
    fn test_header_row_names_unlisted_columns() {
        let html = r#"
            <table id="dtable">
              <thead>
                <tr><th>Code</th><th>College</th><th>District</th><th>Link</th></tr>
                <tr><th>filter</th><th>filter</th><th>filter</th><th>filter</th></tr>
              </thead>
              <tbody>
                <tr><th colspan="4">Government</th></tr>
                <tr><td>1</td><td>CEG</td><td>Chennai</td><td><a href="/ceg">open</a></td></tr>
              </tbody>
            </table>
        "#;
        let config = SourceConfig {
            row_selector: "#dtable tbody tr".into(),
            min_cells: 4,
            key_column: 3,
            key_field: "URL".into(),
            columns: vec![ColumnSpec {
                name: "Counselling Code".into(),
                index: 0,
                link: false,
            }],
            header_columns: Some("#dtable thead th".into()),
            next_selector: None,
            ..SourceConfig::default()
        };
        let page = parse_listing(html, &page_url(), &config).unwrap();

        assert_eq!(page.records.len(), 1);
        let names: Vec<_> = page.records[0].fields.names().collect();
        assert_eq!(names, vec!["Counselling Code", "College", "District", "URL"]);
        assert_eq!(
            page.records[0].fields.get("District").and_then(|v| v.as_text()),
            Some("Chennai")
        );
    }

    #[test]
    fn test_revisited_next_page_stops_pagination() {
        let first = page_url();
        let second = Url::parse("https://irins.org/instances?page=2").unwrap();
        let mut visited = HashSet::new();

        let mut page = ListingPage {
            records: Vec::new(),
            next_url: Some(second.clone()),
        };
        mark_visited(&mut visited, &first, &mut page);
        assert_eq!(page.next_url.as_ref(), Some(&second));

        // Page 2 links back to page 1.
        let mut page = ListingPage {
            records: Vec::new(),
            next_url: Some(first.clone()),
        };
        mark_visited(&mut visited, &second, &mut page);
        assert!(page.next_url.is_none());
        assert_eq!(visited.len(), 2);
    }

    #[tokio::test]
    async fn test_enumerator_requires_open() {
        let config = crate::models::CrawlerConfig::default();
        let client = http::create_client(&config).unwrap();
        let mut source = TableEnumerator::new(
            client,
            SourceConfig::default(),
            RetryPolicy::from_config(&config),
        );

        assert!(source.current_page_records().await.is_err());
        assert!(source.has_next_page().await.is_err());
        assert!(source.advance_page().await.is_err());
    }
}
