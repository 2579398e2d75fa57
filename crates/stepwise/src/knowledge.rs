//! Document search for the manual and scouting report tools.

mod embedder;
mod splitter;
mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use embedder::{HashingEmbedder, HashingEmbedderError};
pub use splitter::{load_documents, split_text};
pub use store::InMemoryVectorStore;

use crate::Error;

/// A searchable piece of text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    /// The text of the section.
    pub page_content: String,
    /// Where the text came from, usually a file name.
    pub source: Option<String>,
}

impl Document {
    /// Creates a document without a source.
    #[inline]
    pub fn new<S: Into<String>>(page_content: S) -> Self {
        Self {
            page_content: page_content.into(),
            source: None,
        }
    }
}

/// A store that finds the documents closest to a query.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns at most `k` documents, most similar first.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Document>, Error>;
}
