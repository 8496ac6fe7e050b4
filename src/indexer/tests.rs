use std::fs;
use std::path::Path;

use super::*;
use crate::testing::{FixedEmbedder, MemoryIndex};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("should create dirs");
    fs::write(path, content).expect("should write file");
}

fn sample_corpus() -> TempDir {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write(
        temp_dir.path(),
        "nextjs/15/en/routing.md",
        "# Routing\n\nThe app router lives in the app directory.",
    );
    write(
        temp_dir.path(),
        "nestjs/11/en/guards.md",
        "# Guards\n\nGuards decide whether a request is handled.",
    );
    write(temp_dir.path(), "nestjs/11/en/logo.png", "not text");
    temp_dir
}

fn options(root: &Path, recreate: bool) -> IngestOptions {
    IngestOptions {
        corpus_root: root.to_path_buf(),
        chunking: ChunkingConfig {
            chunk_size: 30,
            chunk_overlap: 5,
            ..ChunkingConfig::default()
        },
        recreate,
    }
}

#[tokio::test]
async fn ingest_writes_every_chunk_with_metadata() {
    let corpus = sample_corpus();
    let embedder = FixedEmbedder::new(vec![0.5, 0.5]);
    let index = MemoryIndex::new("kb_test");

    let report = Indexer::new(&embedder, &index)
        .with_batch_size(2)
        .ingest(&options(corpus.path(), false))
        .await
        .expect("should ingest");

    assert_eq!(report.documents, 2);
    assert!(report.chunks > 2);
    assert!(report.failed_files.is_empty());
    assert_eq!(embedder.calls(), report.chunks);

    let stored = index.stored();
    assert_eq!(stored.len(), report.chunks);
    assert!(stored.iter().all(|r| r.vector == vec![0.5, 0.5]));
    assert!(stored.iter().any(|r| {
        r.chunk.metadata.framework == "nextjs"
            && r.chunk.metadata.version == "15"
            && r.chunk.metadata.lang == "en"
            && r.chunk.metadata.filename == "routing.md"
    }));
}

#[tokio::test]
async fn empty_corpus_fails_without_writing() {
    let corpus = TempDir::new().expect("should create temp dir");
    write(corpus.path(), "nextjs/15/en/image.png", "binary");
    let embedder = FixedEmbedder::new(vec![1.0]);
    let index = MemoryIndex::with_records("kb_test", Vec::new());

    let result = Indexer::new(&embedder, &index)
        .ingest(&options(corpus.path(), true))
        .await;

    assert!(matches!(result, Err(RagError::EmptyCorpus(_))));
    assert_eq!(embedder.calls(), 0);
    // recreate must not have dropped the collection
    assert!(index.drop_collection().await.is_ok());
}

#[tokio::test]
async fn recreate_tolerates_missing_collection() {
    let corpus = sample_corpus();
    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
    let index = MemoryIndex::new("kb_new");

    let report = Indexer::new(&embedder, &index)
        .ingest(&options(corpus.path(), true))
        .await
        .expect("should ingest");

    assert_eq!(index.count().await.expect("should count"), report.chunks as u64);
}

#[tokio::test]
async fn recreate_is_idempotent() {
    let corpus = sample_corpus();
    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
    let index = MemoryIndex::new("kb_test");
    let indexer = Indexer::new(&embedder, &index);

    let first = indexer
        .ingest(&options(corpus.path(), true))
        .await
        .expect("first ingest");
    let second = indexer
        .ingest(&options(corpus.path(), true))
        .await
        .expect("second ingest");

    assert_eq!(first.chunks, second.chunks);
    assert_eq!(index.count().await.expect("should count"), second.chunks as u64);
}

#[tokio::test]
async fn without_recreate_records_accumulate() {
    let corpus = sample_corpus();
    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
    let index = MemoryIndex::new("kb_test");
    let indexer = Indexer::new(&embedder, &index);

    let first = indexer
        .ingest(&options(corpus.path(), false))
        .await
        .expect("first ingest");
    indexer
        .ingest(&options(corpus.path(), false))
        .await
        .expect("second ingest");

    assert_eq!(
        index.count().await.expect("should count"),
        2 * first.chunks as u64
    );
}

#[tokio::test]
async fn invalid_chunking_is_rejected() {
    let corpus = sample_corpus();
    let embedder = FixedEmbedder::new(vec![1.0]);
    let index = MemoryIndex::new("kb_test");
    let mut opts = options(corpus.path(), false);
    opts.chunking.chunk_overlap = opts.chunking.chunk_size;

    let result = Indexer::new(&embedder, &index).ingest(&opts).await;
    assert!(matches!(result, Err(RagError::Config(_))));
}

#[tokio::test]
async fn embedding_failure_aborts_ingestion() {
    let corpus = sample_corpus();
    let embedder = FixedEmbedder::failing();
    let index = MemoryIndex::new("kb_test");

    let result = Indexer::new(&embedder, &index)
        .ingest(&options(corpus.path(), false))
        .await;

    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert_eq!(index.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn unreadable_files_are_reported() {
    let corpus = sample_corpus();
    let path = corpus.path().join("nextjs/15/en/broken.md");
    fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).expect("should write");
    let embedder = FixedEmbedder::new(vec![1.0]);
    let index = MemoryIndex::new("kb_test");

    let report = Indexer::new(&embedder, &index)
        .ingest(&options(corpus.path(), false))
        .await
        .expect("should ingest the readable files");

    assert_eq!(report.documents, 2);
    assert_eq!(report.failed_files.len(), 1);
    assert_eq!(report.failed_files[0].path, path);
}
