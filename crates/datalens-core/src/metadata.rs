//! Document metadata model
//!
//! A closed set of known fields (chunk type, table name) plus one explicit
//! extension map, so filtering and boosting stay statically checkable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category label on an indexed content unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    /// Table-level schema description
    Table,
    /// Single column description
    Column,
    /// Business metric definition
    Metric,
    /// Join/foreign-key relationship
    Relationship,
    /// Sample query with explanation
    Query,
    /// Free-form text (glossary, notes)
    Text,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Column => "column",
            Self::Metric => "metric",
            Self::Relationship => "relationship",
            Self::Query => "query",
            Self::Text => "text",
        }
    }

    /// Parse from the lowercase wire form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "table" => Some(Self::Table),
            "column" => Some(Self::Column),
            "metric" => Some(Self::Metric),
            "relationship" => Some(Self::Relationship),
            "query" => Some(Self::Query),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Metadata attached to an indexed document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    /// Chunk category, used by reranking boosts and filters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<ChunkType>,

    /// Source table name, when the chunk describes schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Open extension map for anything the closed fields don't cover
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, MetadataValue>,
}

impl DocMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_type(chunk_type: ChunkType) -> Self {
        Self {
            chunk_type: Some(chunk_type),
            ..Default::default()
        }
    }

    /// Look up a field by name, checking known fields before the extension map
    pub fn get(&self, key: &str) -> Option<MetadataValue> {
        match key {
            "chunk_type" => self
                .chunk_type
                .map(|ct| MetadataValue::Str(ct.as_str().to_string())),
            "table" => self.table.clone().map(MetadataValue::Str),
            _ => self.extra.get(key).cloned(),
        }
    }
}

/// Equality filter over document metadata
///
/// All clauses must match for a document to pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    clauses: Vec<(String, MetadataValue)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.clauses.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Check whether metadata satisfies every clause
    pub fn matches(&self, metadata: &DocMetadata) -> bool {
        self.clauses
            .iter()
            .all(|(key, expected)| metadata.get(key).as_ref() == Some(expected))
    }

    /// Parse `key=value` pairs as produced by the CLI
    pub fn parse_pairs(pairs: &[String]) -> crate::error::Result<Self> {
        let mut filter = Self::new();
        for pair in pairs {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                crate::error::DataLensError::InvalidInput(format!(
                    "filter must be key=value, got '{}'",
                    pair
                ))
            })?;
            filter = filter.with(key.trim(), value.trim());
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_type_roundtrip() {
        for ct in [
            ChunkType::Table,
            ChunkType::Column,
            ChunkType::Metric,
            ChunkType::Relationship,
            ChunkType::Query,
            ChunkType::Text,
        ] {
            assert_eq!(ChunkType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(ChunkType::parse("bogus"), None);
    }

    #[test]
    fn test_filter_matches_known_and_extra_fields() {
        let mut meta = DocMetadata::with_chunk_type(ChunkType::Metric);
        meta.table = Some("orders".to_string());
        meta.extra
            .insert("region".to_string(), MetadataValue::from("emea"));

        let filter = MetadataFilter::new()
            .with("chunk_type", "metric")
            .with("table", "orders")
            .with("region", "emea");
        assert!(filter.matches(&meta));

        let miss = MetadataFilter::new().with("table", "customers");
        assert!(!miss.matches(&meta));

        // Absent key never matches
        let absent = MetadataFilter::new().with("owner", "finance");
        assert!(!absent.matches(&meta));
    }

    #[test]
    fn test_parse_pairs() {
        let filter =
            MetadataFilter::parse_pairs(&["chunk_type=table".to_string(), "table=orders".into()])
                .unwrap();
        assert_eq!(
            filter,
            MetadataFilter::new()
                .with("chunk_type", "table")
                .with("table", "orders")
        );

        assert!(MetadataFilter::parse_pairs(&["no-equals".to_string()]).is_err());
    }
}
