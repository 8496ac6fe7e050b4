// Database module
// Vector index contract and the LanceDB implementation

pub mod lancedb;


use async_trait::async_trait;

use crate::Result;
use crate::corpus::ChunkMetadata;

pub use self::lancedb::{EmbeddingRecord, ScoredChunk, VectorStore};

/// Metadata column a filter condition can constrain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Framework,
    Version,
    Lang,
}

impl FilterField {
    #[inline]
    pub fn column(self) -> &'static str {
        match self {
            Self::Framework => "framework",
            Self::Version => "version",
            Self::Lang => "lang",
        }
    }

    fn value_of(self, metadata: &ChunkMetadata) -> &str {
        match self {
            Self::Framework => &metadata.framework,
            Self::Version => &metadata.version,
            Self::Lang => &metadata.lang,
        }
    }
}

/// Conjunction of exact-match conditions over chunk metadata.
///
/// A filter without conditions matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: Vec<(FilterField, String)>,
}

impl MetadataFilter {
    #[inline]
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Add an equality condition; empty values are ignored
    #[inline]
    #[must_use]
    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.conditions.push((field, value));
        }
        self
    }

    #[inline]
    pub fn is_match_all(&self) -> bool {
        self.conditions.is_empty()
    }

    #[inline]
    pub fn conditions(&self) -> &[(FilterField, String)] {
        &self.conditions
    }

    #[inline]
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| field.value_of(metadata) == value)
    }

    /// SQL predicate for LanceDB, `None` for match-all
    #[inline]
    pub fn to_predicate(&self) -> Option<String> {
        if self.conditions.is_empty() {
            return None;
        }

        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(|(field, value)| {
                format!("`{}` = '{}'", field.column(), value.replace('\'', "''"))
            })
            .collect();
        Some(clauses.join(" AND "))
    }
}

/// A vector collection answering filtered nearest-neighbour queries
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the collection this index reads and writes
    fn collection(&self) -> &str;

    /// Append records to the collection, creating it if needed
    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// Up to `limit` nearest records, ascending by distance
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>>;

    /// Drop the whole collection; `CollectionMissing` if it does not exist
    async fn drop_collection(&self) -> Result<()>;

    /// Number of stored records, zero for a missing collection
    async fn count(&self) -> Result<u64>;
}
