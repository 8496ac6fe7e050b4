use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = RagError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("No documents found in {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("Collection '{0}' does not exist")]
    CollectionMissing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod answer;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod profiles;
pub mod repl;
pub mod retrieval;

#[cfg(test)]
mod testing;
