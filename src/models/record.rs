// src/models/record.rs

//! Harvested record and its ordered field mapping.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A scalar field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    /// Integer value, if this is a counter.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    /// Text value, if this is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Integer(_) => None,
            FieldValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Field name to value mapping that keeps insertion order.
///
/// Serialized as a plain JSON object; column order in exports follows the
/// order in which fields were first inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(IndexMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. A replaced field keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Insert only if the field is absent.
    pub fn insert_default(&mut self, name: &str, value: impl Into<FieldValue>) {
        if !self.0.contains_key(name) {
            self.0.insert(name.to_string(), value.into());
        }
    }

    /// Overlay every field of `other` onto `self`.
    pub fn merge(&mut self, other: Fields) {
        self.0.extend(other.0);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fields(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// One harvested entity, identified by its canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique key
    pub key: String,

    /// Listing fields followed by detail fields
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    pub fn new(key: impl Into<String>, fields: Fields) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Overlay detail fields onto the listing fields.
    pub fn with_details(mut self, details: Fields) -> Self {
        self.fields.merge(details);
        self
    }

    /// Default every named counter that the detail page did not provide to zero.
    pub fn with_zero_defaults<S: AsRef<str>>(mut self, numeric_fields: &[S]) -> Self {
        for name in numeric_fields {
            self.fields.insert_default(name.as_ref(), 0);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position_on_replace() {
        let mut fields = Fields::new();
        fields.insert("a", 1);
        fields.insert("b", "x");
        fields.insert("a", 5);

        let names: Vec<_> = fields.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(&FieldValue::Integer(5)));
    }

    #[test]
    fn test_serialization_preserves_order() {
        let fields: Fields = [("zeta", 1), ("alpha", 2)].into_iter().collect();
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":2}"#);

        let parsed: Fields = serde_json::from_str(r#"{"zeta":1,"alpha":"two"}"#).unwrap();
        let names: Vec<_> = parsed.names().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(parsed.get("alpha"), Some(&FieldValue::Text("two".into())));
    }

    #[test]
    fn test_zero_defaults_only_fill_missing() {
        let record = Record::new("https://irins.org/a", [("Total Patents", 7)].into_iter().collect())
            .with_zero_defaults(&["Total Patents", "Scopus Citations"]);

        assert_eq!(record.get("Total Patents"), Some(&FieldValue::Integer(7)));
        assert_eq!(record.get("Scopus Citations"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn test_details_override_listing() {
        let listing: Fields = [("Institute Name", "Old")].into_iter().collect();
        let details: Fields = [("Institute Name", "New")].into_iter().collect();
        let record = Record::new("k", listing).with_details(details);
        assert_eq!(record.get("Institute Name").and_then(|v| v.as_text()), Some("New"));
    }
}
