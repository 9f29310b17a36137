//! Service layer for the harvester.
//!
//! HTTP implementations of the collaborator traits in [`crate::source`]:
//! - Listing enumeration (`TableEnumerator`)
//! - Detail page extraction (`PageDetailFetcher`)

mod detail;
mod table;

pub use detail::{FieldOutcome, PageDetailFetcher, extract_counter, extract_details};
pub use table::{ListingPage, TableEnumerator, parse_listing};

use scraper::Selector;

use crate::error::{AppError, Result};

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
