//! Answer composition.
//!
//! Formats retrieved chunks into a cited context block, picks the response
//! language and asks the generation model for an answer grounded in that
//! context only.
//!
//! Language detection is a coarse heuristic: it counts marker words found as
//! substrings of the lowercased question and breaks ties by whether the
//! question is pure ASCII. Treat its result as a hint, not a verdict.


use itertools::Itertools;
use tracing::debug;

use crate::corpus::{ChunkMetadata, DocumentChunk};
use crate::database::ScoredChunk;
use crate::embeddings::Generator;
use crate::{RagError, Result};

const ENGLISH_MARKERS: &[&str] = &[
    "how", "what", "why", "when", "where", "please", "example", "explain", "create", "generate",
];

const INDONESIAN_MARKERS: &[&str] = &[
    "bagaimana",
    "apa",
    "mengapa",
    "kapan",
    "dimana",
    "contoh",
    "tolong",
    "buatkan",
    "jelaskan",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLanguage {
    English,
    Indonesian,
}

impl ResponseLanguage {
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Indonesian => "Indonesian",
        }
    }

    /// Exact reply expected when the context lacks the answer
    #[inline]
    pub fn refusal(self) -> &'static str {
        match self {
            Self::English => "Not found in the documents.",
            Self::Indonesian => "Tidak ditemukan di dokumen.",
        }
    }
}

fn marker_hits(text: &str, markers: &[&str]) -> usize {
    markers.iter().filter(|marker| text.contains(*marker)).count()
}

/// Guess the language of `question`
#[inline]
pub fn detect_language(question: &str) -> ResponseLanguage {
    let text = question.to_lowercase();
    let english = marker_hits(&text, ENGLISH_MARKERS);
    let indonesian = marker_hits(&text, INDONESIAN_MARKERS);

    match english.cmp(&indonesian) {
        std::cmp::Ordering::Greater => ResponseLanguage::English,
        std::cmp::Ordering::Less => ResponseLanguage::Indonesian,
        std::cmp::Ordering::Equal if text.is_ascii() => ResponseLanguage::English,
        std::cmp::Ordering::Equal => ResponseLanguage::Indonesian,
    }
}

fn citation(metadata: &ChunkMetadata) -> String {
    format!(
        "- ({}/{}/{} - {})",
        metadata.framework, metadata.version, metadata.lang, metadata.filename
    )
}

/// Cited context block, one entry per hit in order, blank-line separated
#[inline]
pub fn build_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| format!("{}\n{}", citation(&hit.chunk.metadata), hit.chunk.text))
        .join("\n\n")
}

#[inline]
pub fn build_prompt(question: &str, context: &str, language: ResponseLanguage) -> String {
    format!(
        r#"You are a helpful, bilingual (English & Indonesian) assistant.

TARGET LANGUAGE: {label}

Rules:
- Answer **only** in the target language above.
- Length: aim for **4-8 sentences** (or concise bullet points), not too short, but clear.
- Use code blocks when helpful.
- Rely **strictly** on the provided context. If the answer is not present in the context, reply exactly:
  - English: "{english}"
  - Indonesian: "{indonesian}"

# Question
{question}

# Context
{context}
"#,
        label = language.label(),
        english = ResponseLanguage::English.refusal(),
        indonesian = ResponseLanguage::Indonesian.refusal(),
    )
}

#[derive(Debug, Clone)]
pub struct Answer {
    /// Raw model output
    pub text: String,
    /// Chunks given as context, in retrieval order
    pub sources: Vec<DocumentChunk>,
    pub language: ResponseLanguage,
}

pub struct AnswerComposer<'a> {
    generator: &'a dyn Generator,
}

impl<'a> AnswerComposer<'a> {
    #[inline]
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self { generator }
    }

    /// Generate an answer from `hits`; `lang_hint` overrides detection
    #[inline]
    pub fn compose(
        &self,
        question: &str,
        hits: &[ScoredChunk],
        lang_hint: Option<ResponseLanguage>,
    ) -> Result<Answer> {
        let language = lang_hint.unwrap_or_else(|| detect_language(question));
        let context = build_context(hits);
        let prompt = build_prompt(question, &context, language);

        debug!(
            "Composing {} answer from {} chunks ({} prompt chars)",
            language.label(),
            hits.len(),
            prompt.len()
        );

        let text = self
            .generator
            .generate(&prompt)
            .map_err(|e| RagError::Generation(format!("{:#}", e)))?;

        Ok(Answer {
            text,
            sources: hits.iter().map(|hit| hit.chunk.clone()).collect(),
            language,
        })
    }
}
