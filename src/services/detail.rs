// src/services/detail.rs

//! Detail page fetcher.
//!
//! Extracts integer counters from a record's detail page. Each counter is
//! resolved independently: a missing or unparsable counter becomes zero and
//! never fails the record.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html};

use crate::error::Result;
use crate::models::{DetailConfig, Fields};
use crate::services::parse_selector;
use crate::source::DetailFetcher;
use crate::utils::http::{self, RetryPolicy};
use crate::utils::{normalize_whitespace, parse_count};

/// Result of extracting one counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// Element found with a numeric value
    Present(i64),
    /// Element not on the page
    Absent,
    /// Element found but its text is not a number
    Invalid(String),
}

impl FieldOutcome {
    fn from_element(element: Option<ElementRef>) -> Self {
        match element {
            None => FieldOutcome::Absent,
            Some(el) => {
                let raw = normalize_whitespace(&el.text().collect::<String>());
                match parse_count(&raw) {
                    Some(n) => FieldOutcome::Present(n),
                    None => FieldOutcome::Invalid(raw),
                }
            }
        }
    }

    /// Value to record, defaulting to zero.
    pub fn value_or_zero(&self, field: &str) -> i64 {
        match self {
            FieldOutcome::Present(n) => *n,
            FieldOutcome::Absent => 0,
            FieldOutcome::Invalid(raw) => {
                log::warn!("Field '{}' has non-numeric value '{}', using 0", field, raw);
                0
            }
        }
    }
}

/// Fetches and parses detail pages over HTTP.
pub struct PageDetailFetcher {
    client: Client,
    config: DetailConfig,
    retry: RetryPolicy,
}

impl PageDetailFetcher {
    pub fn new(client: Client, config: DetailConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }
}

#[async_trait]
impl DetailFetcher for PageDetailFetcher {
    async fn fetch(&self, key: &str) -> Result<Fields> {
        let html = http::fetch_text(&self.client, key, self.retry).await?;
        extract_details(&html, &self.config)
    }
}

/// Outcome of a single-counter selector on a parsed document.
pub fn extract_counter(document: &Html, selector: &str) -> Result<FieldOutcome> {
    let sel = parse_selector(selector)?;
    Ok(FieldOutcome::from_element(document.select(&sel).next()))
}

/// Extract all configured counters from a detail page.
pub fn extract_details(html: &str, config: &DetailConfig) -> Result<Fields> {
    let document = Html::parse_document(html);
    let mut fields = Fields::new();

    for counter in &config.counters {
        let outcome = extract_counter(&document, &counter.selector)?;
        fields.insert(counter.name.clone(), outcome.value_or_zero(&counter.name));
    }

    if let Some(breakdown) = &config.breakdown {
        let item_sel = parse_selector(&breakdown.item_selector)?;
        let count_sel = parse_selector(&breakdown.count_selector)?;
        for item in document.select(&item_sel) {
            let Some(label) = leading_text(&item) else {
                continue;
            };
            let outcome = FieldOutcome::from_element(item.select(&count_sel).next());
            let value = outcome.value_or_zero(&label);
            fields.insert(label, value);
        }
    }

    for group in &config.groups {
        for name in &group.names {
            fields.insert(name.clone(), 0);
        }
        let block_sel = parse_selector(&group.block_selector)?;
        let counter_sel = parse_selector(&group.counter_selector)?;
        let Some(block) = document.select(&block_sel).next() else {
            continue;
        };
        let counters: Vec<ElementRef> = block.select(&counter_sel).collect();
        if counters.len() < group.names.len() {
            log::debug!(
                "Block '{}' has {} counters, expected {}",
                group.block_selector,
                counters.len(),
                group.names.len()
            );
            continue;
        }
        for (name, element) in group.names.iter().zip(counters) {
            let value = FieldOutcome::from_element(Some(element)).value_or_zero(name);
            fields.insert(name.clone(), value);
        }
    }

    if let Some(name) = &config.summary_field {
        fields.insert(name.clone(), visible_text(&document));
    }

    Ok(fields)
}

/// All text of the page outside script and style elements, one space
/// between strings.
fn visible_text(document: &Html) -> String {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
            });
            (!hidden).then(|| normalize_whitespace(text))
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First non-blank direct text node of an element.
fn leading_text(element: &ElementRef) -> Option<String> {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| normalize_whitespace(text))
        .find(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;

    const PROFILE: &str = r#"
        <div>
          <span id="total_f">1,204</span>
          <span id="total_p">8630</span>
          <ul class="reseacher-box-ul">
            <li>Article <span class="counter-home">6120</span></li>
            <li>Book Chapter <span class="counter-home">310</span></li>
            <li>  </li>
          </ul>
          <div class="service-block-v3 service-block-sea">
            <span class="counter">45210</span>
            <span class="counter">30877</span>
          </div>
        </div>
    "#;

    fn int(fields: &Fields, name: &str) -> Option<i64> {
        fields.get(name).and_then(FieldValue::as_integer)
    }

    #[test]
    fn test_extract_full_profile() {
        let fields = extract_details(PROFILE, &DetailConfig::default()).unwrap();

        assert_eq!(int(&fields, "Total Faculty / Scientist"), Some(1204));
        assert_eq!(int(&fields, "Total Publications"), Some(8630));
        assert_eq!(int(&fields, "Article"), Some(6120));
        assert_eq!(int(&fields, "Book Chapter"), Some(310));
        assert_eq!(int(&fields, "Google Scholar Citations"), Some(45210));
        assert_eq!(int(&fields, "Scopus Citations"), Some(30877));
    }

    #[test]
    fn test_missing_counters_default_to_zero() {
        let fields = extract_details("<html><body></body></html>", &DetailConfig::default()).unwrap();

        assert_eq!(int(&fields, "Total Patents"), Some(0));
        assert_eq!(int(&fields, "Google Scholar Citations"), Some(0));
        assert_eq!(int(&fields, "Scopus Citations"), Some(0));
    }

    #[test]
    fn test_partial_group_keeps_zeroes() {
        let html = r#"<div class="service-block-v3 service-block-sea"><span class="counter">9</span></div>"#;
        let fields = extract_details(html, &DetailConfig::default()).unwrap();
        assert_eq!(int(&fields, "Google Scholar Citations"), Some(0));
    }

    #[test]
    fn test_absent_and_invalid_are_distinguished() {
        let document = Html::parse_document(r#"<span id="total_patent">n/a</span>"#);

        assert_eq!(
            extract_counter(&document, "#total_patent").unwrap(),
            FieldOutcome::Invalid("n/a".to_string())
        );
        assert_eq!(
            extract_counter(&document, "#total_f").unwrap(),
            FieldOutcome::Absent
        );
        assert!(extract_counter(&document, "[[bad").is_err());
    }

    #[test]
    fn test_summary_field_collects_visible_text() {
        let html = r#"
            <html><head><title>KJ College</title><style>p { color: red }</style></head>
            <body>
              <script>var hidden = 1;</script>
              <h1>  Intake   Summary </h1>
              <p>Total intake: <b>240</b></p>
              <noscript>enable js</noscript>
            </body></html>
        "#;
        let config = DetailConfig {
            counters: Vec::new(),
            breakdown: None,
            groups: Vec::new(),
            summary_field: Some("SummaryText".into()),
            ..DetailConfig::default()
        };
        let fields = extract_details(html, &config).unwrap();

        assert_eq!(
            fields.get("SummaryText").and_then(FieldValue::as_text),
            Some("KJ College Intake Summary Total intake: 240")
        );
        assert_eq!(fields.len(), 1);
    }
}
