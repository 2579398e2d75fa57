use std::cmp::Ordering;

use async_trait::async_trait;
use stepwise_model::EmbeddingProvider;

use super::{Document, VectorStore};
use crate::Error;

/// A vector store kept entirely in memory.
///
/// Documents are ranked by cosine similarity to the query. Documents with
/// equal scores keep the order they were added in.
pub struct InMemoryVectorStore<E> {
    embedder: E,
    entries: Vec<(Document, Vec<f32>)>,
}

impl<E: EmbeddingProvider> InMemoryVectorStore<E> {
    /// Creates an empty store.
    #[inline]
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: vec![],
        }
    }

    /// Embeds and stores the documents.
    pub async fn add_documents(
        &mut self,
        documents: Vec<Document>,
    ) -> Result<(), Error> {
        if documents.is_empty() {
            return Ok(());
        }
        let texts: Vec<_> = documents
            .iter()
            .map(|doc| doc.page_content.clone())
            .collect();
        let vectors = embed(&self.embedder, &texts).await?;
        debug!("stored {} documents", documents.len());
        self.entries.extend(documents.into_iter().zip(vectors));
        Ok(())
    }

    /// Returns the number of stored documents.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl<E: EmbeddingProvider> VectorStore for InMemoryVectorStore<E> {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Document>, Error> {
        if k == 0 || self.entries.is_empty() {
            return Ok(vec![]);
        }
        let query_vector = embed(&self.embedder, &[query.to_owned()])
            .await?
            .pop()
            .unwrap_or_default();

        let mut scored: Vec<_> = self
            .entries
            .iter()
            .map(|(doc, vector)| (cosine_similarity(&query_vector, vector), doc))
            .collect();
        // Stable sort, so ties stay in insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        trace!("top score for {query:?}: {:?}", scored.first().map(|s| s.0));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, doc)| doc.clone())
            .collect())
    }
}

async fn embed<E: EmbeddingProvider>(
    embedder: &E,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, Error> {
    let vectors = embedder
        .embed(texts)
        .await
        .map_err(|err| Error::Embedding(Box::new(err)))?;
    if vectors.len() != texts.len() {
        return Err(Error::EmbeddingCount {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}

/// Returns 0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
