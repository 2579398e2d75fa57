use std::path::PathBuf;

use stepwise_core::AgentError;
use stepwise_model::ModelProviderError;

/// Errors raised while preparing or running a scenario.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file or directory could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The order table is missing a column or has a malformed row.
    #[error("malformed order table: {0}")]
    Csv(#[from] csv::Error),
    /// The embedding provider failed.
    #[error("embedding failed: {0}")]
    Embedding(Box<dyn ModelProviderError>),
    /// The embedding provider returned the wrong number of vectors.
    #[error("expected {expected} embeddings, got {actual}")]
    EmbeddingCount {
        /// Number of texts sent.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// The agent failed.
    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
