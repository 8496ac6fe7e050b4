// LanceDB vector database module
// Handles vector storage and similarity search for embedded chunks


pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::corpus::DocumentChunk;

pub use vector_store::VectorStore;

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding
    pub id: String,
    /// The vector embedding (768 dimensions for nomic-embed-text)
    pub vector: Vec<f32>,
    /// The chunk text and its provenance
    pub chunk: DocumentChunk,
    /// RFC 3339 timestamp when this embedding was created
    pub created_at: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn new(chunk: DocumentChunk, vector: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            chunk,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A retrieved chunk with its cosine distance to the query (0 = identical)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub distance: f32,
}
