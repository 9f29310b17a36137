// src/models/output.rs

//! The Output Set: ordered, key-unique, append-only collection of records.

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::models::Record;

/// On-disk envelope of the Output Set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSnapshot {
    /// ISO 8601 timestamp of the last write
    pub updated_at: DateTime<Utc>,
    /// Record count
    pub count: usize,
    /// Union of field names, first-seen order
    #[serde(default)]
    pub columns: Vec<String>,
    /// SHA-256 of the first enumerated page's keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_digest: Option<String>,
    /// The records, in harvest order
    pub records: Vec<Record>,
}

/// Ordered collection of completed records, keyed by record key.
#[derive(Debug, Clone, Default)]
pub struct OutputSet {
    records: IndexMap<String, Record>,
    columns: IndexSet<String>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records. Later duplicates of a key are dropped.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut set = Self::new();
        for record in records {
            let key = record.key.clone();
            if !set.push(record) {
                log::warn!("Dropping duplicate record for key {} found in output", key);
            }
        }
        set
    }

    pub fn from_snapshot(snapshot: OutputSnapshot) -> Self {
        Self::from_records(snapshot.records)
    }

    /// Append a record. Returns `false` (and leaves the set untouched) if the
    /// key is already present.
    pub fn push(&mut self, record: Record) -> bool {
        if self.records.contains_key(&record.key) {
            return false;
        }
        for name in record.fields.names() {
            if !self.columns.contains(name) {
                self.columns.insert(name.to_string());
            }
        }
        self.records.insert(record.key.clone(), record);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Key of the most recently appended record.
    pub fn last_key(&self) -> Option<&str> {
        self.records.last().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in harvest order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Union of field names, first-seen order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// Build the persisted envelope.
    pub fn snapshot(&self, source_digest: Option<String>) -> OutputSnapshot {
        OutputSnapshot {
            updated_at: Utc::now(),
            count: self.records.len(),
            columns: self.columns.iter().cloned().collect(),
            source_digest,
            records: self.records.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fields;

    fn record(key: &str, fields: &[(&str, i64)]) -> Record {
        Record::new(key, fields.iter().map(|(n, v)| (*n, *v)).collect::<Fields>())
    }

    #[test]
    fn test_push_rejects_duplicate_keys() {
        let mut set = OutputSet::new();
        assert!(set.push(record("A", &[("n", 1)])));
        assert!(!set.push(record("A", &[("n", 2)])));
        assert_eq!(set.len(), 1);
        let first = set.records().next().unwrap();
        assert_eq!(first.get("n").and_then(|v| v.as_integer()), Some(1));
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let mut set = OutputSet::new();
        set.push(record("A", &[("x", 1), ("y", 2)]));
        set.push(record("B", &[("z", 3), ("x", 4)]));
        assert_eq!(set.columns().collect::<Vec<_>>(), vec!["x", "y", "z"]);
        assert_eq!(set.last_key(), Some("B"));
    }

    #[test]
    fn test_snapshot_round_trip_keeps_order() {
        let mut set = OutputSet::new();
        set.push(record("A", &[("n", 1)]));
        set.push(record("B", &[("n", 2)]));

        let json = serde_json::to_string(&set.snapshot(Some("abc".into()))).unwrap();
        let snapshot: OutputSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.source_digest.as_deref(), Some("abc"));

        let restored = OutputSet::from_snapshot(snapshot);
        let keys: Vec<_> = restored.records().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert!(restored.contains("B"));
    }

    #[test]
    fn test_from_records_drops_duplicates() {
        let set = OutputSet::from_records(vec![
            record("A", &[("n", 1)]),
            record("A", &[("n", 9)]),
            record("B", &[("n", 2)]),
        ]);
        assert_eq!(set.len(), 2);
    }
}
