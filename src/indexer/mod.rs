// Indexer module
// One-shot ingestion: load the corpus, chunk, embed and write to a collection

use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::corpus::{LoadFailure, load_corpus};
use crate::database::{EmbeddingRecord, VectorIndex};
use crate::embeddings::{ChunkingConfig, Embedder, split_documents};
use crate::{RagError, Result};

#[cfg(test)]
mod tests;

const DEFAULT_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub corpus_root: PathBuf,
    pub chunking: ChunkingConfig,
    /// Drop the collection before writing
    pub recreate: bool,
}

/// Summary of one ingestion run
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub failed_files: Vec<LoadFailure>,
}

/// Writes a corpus into a vector collection
pub struct Indexer<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    batch_size: usize,
}

impl<'a> Indexer<'a> {
    #[inline]
    pub fn new(embedder: &'a dyn Embedder, index: &'a dyn VectorIndex) -> Self {
        Self {
            embedder,
            index,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Number of chunks embedded and written per round trip
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run a full ingestion.
    ///
    /// Fails with [`RagError::EmptyCorpus`] before touching the collection
    /// when no document could be loaded. With `recreate`, a collection that
    /// does not exist yet is not an error.
    #[inline]
    pub async fn ingest(&self, options: &IngestOptions) -> Result<IngestReport> {
        options
            .chunking
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let corpus = load_corpus(&options.corpus_root)?;
        if corpus.documents.is_empty() {
            return Err(RagError::EmptyCorpus(options.corpus_root.clone()));
        }

        if options.recreate {
            self.drop_existing().await?;
        }

        let chunks = split_documents(&corpus.documents, &options.chunking)
            .map_err(|e| RagError::Config(e.to_string()))?;
        info!("Split into {} chunks", chunks.len());

        let bar = progress_bar(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

            if vectors.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            let records: Vec<EmbeddingRecord> = batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddingRecord::new(chunk, vector))
                .collect();
            self.index.add(records).await?;

            bar.inc(batch.len() as u64);
            debug!("Stored batch of {} chunks", batch.len());
        }
        bar.finish_and_clear();

        info!(
            "Ingested {} chunks into '{}'",
            chunks.len(),
            self.index.collection()
        );

        Ok(IngestReport {
            documents: corpus.documents.len(),
            chunks: chunks.len(),
            failed_files: corpus.failures,
        })
    }

    async fn drop_existing(&self) -> Result<()> {
        match self.index.drop_collection().await {
            Ok(()) => {
                info!("Dropped collection '{}'", self.index.collection());
                Ok(())
            }
            Err(RagError::CollectionMissing(name)) => {
                warn!("Collection '{}' did not exist, nothing to drop", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(len as u64).with_style(style)
}
