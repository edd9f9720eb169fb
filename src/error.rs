use std::path::PathBuf;

use thiserror::Error;

/// Conditions the crawl and aggregation stages branch on.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("gave up on {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("http {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("no table matching {0}")]
    MissingTable(String),

    #[error("no link matching {0}")]
    MissingLink(String),

    #[error("match log and shooting log share no dates")]
    EmptyJoin,

    #[error("no checkpoint artifacts under {}", .0.display())]
    NoArtifacts(PathBuf),
}
