//! Pipeline entry points for harvester operations.
//!
//! - `Harvester`: the resumable, checkpointed harvest loop
//! - `run_harvest`: harvest over HTTP as configured
//! - `run_export`: tabular export of the persisted Output Set
//! - `load_status`: persisted progress summary

pub mod harvest;
pub mod run;

pub use harvest::{HarvestOptions, HarvestReport, Harvester};
pub use run::{HarvestStatus, load_status, run_export, run_harvest};
