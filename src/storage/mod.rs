//! Storage abstractions for harvest persistence.
//!
//! Two artifacts are kept per harvest, both replaced whole on every write:
//!
//! ```text
//! storage/
//! ├── output.json       # Output Set snapshot (source of truth)
//! ├── output.csv        # Spreadsheet mirror of the snapshot
//! └── checkpoint.txt    # Key of the last completed record
//! ```
//!
//! The output is always written before the checkpoint, so the checkpoint
//! can lag the output by at most one record, never lead it.

pub mod local;
pub mod table;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::OutputSnapshot;

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for harvest storage backends.
#[async_trait]
pub trait HarvestStorage: Send + Sync {
    /// Load the persisted Output Set, if any.
    async fn load_output(&self) -> Result<Option<OutputSnapshot>>;

    /// Replace the persisted Output Set.
    async fn save_output(&self, snapshot: &OutputSnapshot) -> Result<()>;

    /// Load the last completed key, if any.
    async fn load_checkpoint(&self) -> Result<Option<String>>;

    /// Replace the checkpoint with `key`.
    async fn save_checkpoint(&self, key: &str) -> Result<()>;
}
