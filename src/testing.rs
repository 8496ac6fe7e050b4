// In-memory doubles for the embedder, generator and vector index

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::corpus::{ChunkMetadata, DocumentChunk};
use crate::database::{EmbeddingRecord, MetadataFilter, ScoredChunk, VectorIndex};
use crate::embeddings::{Embedder, Generator};
use crate::{RagError, Result};

pub fn chunk(text: &str, framework: &str, version: &str, lang: &str) -> DocumentChunk {
    DocumentChunk {
        text: text.to_string(),
        metadata: ChunkMetadata {
            source_path: format!("corpus/{framework}/{version}/{lang}/{text}.md"),
            framework: framework.to_string(),
            version: version.to_string(),
            lang: lang.to_string(),
            filename: format!("{text}.md"),
        },
    }
}

/// Unit vector whose cosine distance to `[1, 0]` is `distance` (0..=1)
pub fn vector_at_distance(distance: f32) -> Vec<f32> {
    let cos = 1.0 - distance;
    vec![cos, (1.0 - cos * cos).max(0.0).sqrt()]
}

pub const QUERY_VECTOR: [f32; 2] = [1.0, 0.0];

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Brute-force cosine index that records every search filter
pub struct MemoryIndex {
    name: String,
    records: Mutex<Option<Vec<EmbeddingRecord>>>,
    searches: Mutex<Vec<MetadataFilter>>,
}

impl MemoryIndex {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Mutex::new(None),
            searches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_records(name: &str, records: Vec<EmbeddingRecord>) -> Self {
        let index = Self::new(name);
        *index.records.lock().expect("records lock") = Some(records);
        index
    }

    pub fn searches(&self) -> Vec<MetadataFilter> {
        self.searches.lock().expect("searches lock").clone()
    }

    pub fn stored(&self) -> Vec<EmbeddingRecord> {
        self.records
            .lock()
            .expect("records lock")
            .clone()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn collection(&self) -> &str {
        &self.name
    }

    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        self.records
            .lock()
            .expect("records lock")
            .get_or_insert_with(Vec::new)
            .extend(records);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>> {
        self.searches
            .lock()
            .expect("searches lock")
            .push(filter.clone());

        let guard = self.records.lock().expect("records lock");
        let records = guard
            .as_ref()
            .ok_or_else(|| RagError::CollectionMissing(self.name.clone()))?;

        let mut hits: Vec<ScoredChunk> = records
            .iter()
            .filter(|r| filter.matches(&r.chunk.metadata))
            .map(|r| ScoredChunk {
                chunk: r.chunk.clone(),
                distance: cosine_distance(vector, &r.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn drop_collection(&self) -> Result<()> {
        self.records
            .lock()
            .expect("records lock")
            .take()
            .map(|_| ())
            .ok_or_else(|| RagError::CollectionMissing(self.name.clone()))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.stored().len() as u64)
    }
}

/// Embedder returning the same vector for every text
pub struct FixedEmbedder {
    vector: Vec<f32>,
    fail: bool,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Number of texts embedded so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_vector(&self) -> anyhow::Result<Vec<f32>> {
        if self.fail {
            return Err(anyhow!("embedding service unavailable"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.clone())
    }
}

impl Embedder for FixedEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        self.next_vector()
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|_| self.next_vector()).collect()
    }
}

/// Generator that records prompts and answers with a canned reply
pub struct RecordingGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

impl Generator for RecordingGenerator {
    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("generation model unavailable"))
    }
}
