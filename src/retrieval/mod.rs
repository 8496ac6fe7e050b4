// Retrieval-and-fallback policy
//
// Embed the question once, search under the selected profile, apply the
// relevance gate and, when an unfiltered search looks weak, retry under a
// profile guessed from keywords in the question.


use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::database::{MetadataFilter, ScoredChunk, VectorIndex};
use crate::embeddings::Embedder;
use crate::profiles::{Profiles, build_filter, parse_selection};
use crate::{RagError, Result};

/// Keywords that route a question to a profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordVocabulary {
    pub profile: String,
    pub keywords: Vec<String>,
}

impl KeywordVocabulary {
    #[inline]
    pub fn new(profile: &str, keywords: &[&str]) -> Self {
        Self {
            profile: profile.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Neighbours requested per search
    pub top_k: usize,
    /// Hits farther than this are dropped unless that would leave nothing
    pub threshold_strict: f32,
    /// An unfiltered search whose best hit is farther than this is weak
    pub threshold_weak: f32,
    /// Checked in order; the first vocabulary with a hit wins
    pub vocabularies: Vec<KeywordVocabulary>,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 8,
            threshold_strict: 0.8,
            threshold_weak: 0.9,
            vocabularies: vec![
                KeywordVocabulary::new(
                    "nextjs15-en",
                    &[
                        "nextjs",
                        "next.js",
                        "next js",
                        "react server component",
                        "rsc",
                        "app router",
                        "route handler",
                        "server action",
                        "middleware",
                        "layout.tsx",
                    ],
                ),
                KeywordVocabulary::new(
                    "nestjs11-en",
                    &[
                        "nestjs",
                        "nest.js",
                        "nest js",
                        "controller",
                        "provider",
                        "module",
                        "decorator",
                        "guard",
                        "interceptor",
                        "pipe",
                    ],
                ),
            ],
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        let ordered = 0.0 <= self.threshold_strict
            && self.threshold_strict <= self.threshold_weak
            && self.threshold_weak <= 2.0;
        if !ordered {
            return Err(ConfigError::InvalidThresholds(
                self.threshold_strict,
                self.threshold_weak,
            ));
        }

        Ok(())
    }
}

/// Profile whose vocabulary has a substring hit in the lowercased `text`
#[inline]
pub fn classify<'a>(text: &str, vocabularies: &'a [KeywordVocabulary]) -> Option<&'a str> {
    let text = text.to_lowercase();
    vocabularies
        .iter()
        .find(|vocabulary| {
            vocabulary
                .keywords
                .iter()
                .any(|keyword| text.contains(&keyword.to_lowercase()))
        })
        .map(|vocabulary| vocabulary.profile.as_str())
}

/// Keep hits within `threshold`; if none qualify, keep them all.
///
/// The result is ascending by distance with ties in index order, and is
/// never empty when `hits` is not.
#[inline]
pub fn apply_relevance_gate(mut hits: Vec<ScoredChunk>, threshold: f32) -> Vec<ScoredChunk> {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let kept = hits.iter().take_while(|hit| hit.distance <= threshold).count();
    if kept > 0 {
        hits.truncate(kept);
    }
    hits
}

/// Outcome of one retrieval
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub hits: Vec<ScoredChunk>,
    /// Profile that produced `hits`; `None` means no filter
    pub profile_used: Option<String>,
    /// True when a keyword-guessed profile replaced the unfiltered results
    pub fallback_used: bool,
}

pub struct RetrievalPolicy<'a> {
    index: &'a dyn VectorIndex,
    embedder: &'a dyn Embedder,
    profiles: &'a Profiles,
    config: &'a RetrievalConfig,
}

impl<'a> RetrievalPolicy<'a> {
    #[inline]
    pub fn new(
        index: &'a dyn VectorIndex,
        embedder: &'a dyn Embedder,
        profiles: &'a Profiles,
        config: &'a RetrievalConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            profiles,
            config,
        }
    }

    /// Retrieve up to `k` chunks for `question` under `profile`.
    ///
    /// `profile` of `None` or `all` searches without a filter. An unknown
    /// profile fails before anything is embedded or searched.
    #[inline]
    pub async fn retrieve(
        &self,
        question: &str,
        profile: Option<&str>,
        k: usize,
    ) -> Result<Retrieval> {
        if k == 0 {
            return Err(RagError::InvalidInput("top-k must be at least 1".to_string()));
        }

        let selection = profile.and_then(parse_selection);
        let filter = self.profiles.filter_for(selection)?;

        let vector = self
            .embedder
            .embed(question)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        let hits = self.gated_search(&vector, k, &filter).await?;
        let mut retrieval = Retrieval {
            hits,
            profile_used: selection.map(str::to_string),
            fallback_used: false,
        };

        if !filter.is_match_all() || !self.is_weak(&retrieval.hits) {
            return Ok(retrieval);
        }

        let Some(guessed) = classify(question, &self.config.vocabularies) else {
            debug!("Weak unfiltered results and no keyword match");
            return Ok(retrieval);
        };
        let Some(guessed_profile) = self.profiles.get(guessed) else {
            debug!("Guessed profile '{}' is not registered", guessed);
            return Ok(retrieval);
        };

        let fallback_filter = build_filter(Some(guessed_profile));
        let fallback_hits = self.gated_search(&vector, k, &fallback_filter).await?;
        if fallback_hits.is_empty() {
            debug!("Fallback profile '{}' returned nothing", guessed);
            return Ok(retrieval);
        }

        info!(
            "Weak unfiltered results, using fallback profile '{}'",
            guessed
        );
        retrieval.hits = fallback_hits;
        retrieval.profile_used = Some(guessed.to_string());
        retrieval.fallback_used = true;
        Ok(retrieval)
    }

    async fn gated_search(
        &self,
        vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let hits = self.index.search(vector, k, filter).await?;
        debug!(
            "Search returned {} hits, best distance {:?}",
            hits.len(),
            hits.first().map(|h| h.distance)
        );
        Ok(apply_relevance_gate(hits, self.config.threshold_strict))
    }

    fn is_weak(&self, hits: &[ScoredChunk]) -> bool {
        hits.first()
            .is_none_or(|best| best.distance > self.config.threshold_weak)
    }
}
