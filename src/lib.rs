// src/lib.rs

//! Harvester Library
//!
//! Resumable, checkpointed harvesting of paginated directory listings.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod source;
pub mod storage;
pub mod utils;
