//! Corpus loading.
//!
//! The corpus layout is the metadata schema: for a file at
//! `<root>/<framework>/<version>/<lang>/...`, the first three path
//! components relative to the root become `framework`, `version` and `lang`.
//! Components are taken positionally and include the file name itself, so a
//! misplaced file silently gets wrong metadata rather than failing.


use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{RagError, Result};

/// Extensions loaded as UTF-8 plain text
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "csv"];

/// Extension loaded page by page
pub const PDF_EXTENSION: &str = "pdf";

/// Provenance attached to every chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_path: String,
    pub framework: String,
    pub version: String,
    pub lang: String,
    pub filename: String,
}

/// A loaded text unit: a whole text file or a single PDF page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A bounded slice of a source document; never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A file that could not be loaded
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct LoadedCorpus {
    pub documents: Vec<SourceDocument>,
    pub failures: Vec<LoadFailure>,
}

enum FileKind {
    Text,
    Pdf,
}

/// Walk `root` recursively and load every supported file.
///
/// Unsupported extensions are skipped silently. A file that fails to load is
/// logged and recorded in [`LoadedCorpus::failures`]; the walk continues.
#[inline]
pub fn load_corpus(root: &Path) -> Result<LoadedCorpus> {
    if !root.is_dir() {
        return Err(RagError::Corpus(format!(
            "{} is not a readable directory",
            root.display()
        )));
    }

    let mut corpus = LoadedCorpus::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                warn!("Skipping unreadable entry {}: {}", path.display(), e);
                corpus.failures.push(LoadFailure {
                    path,
                    error: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(kind) = file_kind(path) else {
            continue;
        };

        let metadata = metadata_for_path(root, path);
        let loaded = match kind {
            FileKind::Text => load_text(path).map(|text| vec![text]),
            FileKind::Pdf => load_pdf_pages(path),
        };

        match loaded {
            Ok(texts) => {
                debug!("Loaded {} unit(s) from {}", texts.len(), path.display());
                corpus
                    .documents
                    .extend(texts.into_iter().map(|text| SourceDocument {
                        text,
                        metadata: metadata.clone(),
                    }));
            }
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                corpus.failures.push(LoadFailure {
                    path: path.to_path_buf(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    info!(
        "Loaded {} documents from {} ({} failures)",
        corpus.documents.len(),
        root.display(),
        corpus.failures.len()
    );
    Ok(corpus)
}

/// Derive provenance metadata from a file's position under `root`
#[inline]
pub fn metadata_for_path(root: &Path, path: &Path) -> ChunkMetadata {
    let parts: Vec<String> = path
        .strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let part = |index: usize| parts.get(index).cloned().unwrap_or_default();

    ChunkMetadata {
        source_path: path.display().to_string(),
        framework: part(0),
        version: part(1),
        lang: part(2),
        filename: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    if TEXT_EXTENSIONS.contains(&extension.as_str()) {
        Some(FileKind::Text)
    } else if extension == PDF_EXTENSION {
        Some(FileKind::Pdf)
    } else {
        None
    }
}

fn load_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_pdf_pages(path: &Path) -> anyhow::Result<Vec<String>> {
    let document = lopdf::Document::load(path)
        .with_context(|| format!("Failed to parse PDF {}", path.display()))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        match document.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => pages.push(text),
            Ok(_) => debug!("Page {} of {} has no text", page_number, path.display()),
            Err(e) => warn!(
                "Failed to extract page {} of {}: {}",
                page_number,
                path.display(),
                e
            ),
        }
    }

    if pages.is_empty() {
        return Err(anyhow!("No extractable text in {}", path.display()));
    }
    Ok(pages)
}
