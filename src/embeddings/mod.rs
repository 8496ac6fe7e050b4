// Embeddings module
// Ollama integration for embedding and generation, plus text chunking

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, split_documents, split_text};
pub use ollama::OllamaClient;

/// Maps text to a fixed-length vector.
///
/// The same embedder (model and endpoint) must be used at ingestion and at
/// query time, otherwise distances between stored and query vectors are
/// meaningless.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Produces a completion for a prompt
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}
