use std::collections::hash_map::DefaultHasher;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::ready;
use std::hash::{Hash, Hasher};

use stepwise_model::{EmbeddingProvider, ErrorKind, ModelProviderError};

const DEFAULT_DIMENSIONS: usize = 256;

/// An offline embedder that hashes words into a fixed-size vector.
///
/// Texts sharing words get similar vectors, which is enough to search a
/// few manuals without a network round trip. The output is deterministic
/// and L2-normalised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Creates an embedder producing vectors of `dimensions` entries.
    /// Zero is raised to one.
    #[inline]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Returns the vector length.
    #[inline]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty());
        for word in words {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash % self.dimensions as u64) as usize;
            // The top bit picks the sign so colliding words may cancel out
            // instead of always piling up.
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

/// [`HashingEmbedder`] never fails.
#[derive(Debug)]
pub enum HashingEmbedderError {}

impl Display for HashingEmbedderError {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl StdError for HashingEmbedderError {}

impl ModelProviderError for HashingEmbedderError {
    fn kind(&self) -> ErrorKind {
        match *self {}
    }
}

impl EmbeddingProvider for HashingEmbedder {
    type Error = HashingEmbedderError;

    fn embed(
        &self,
        inputs: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, Self::Error>> + Send + 'static
    {
        let vectors = inputs.iter().map(|text| self.embed_one(text)).collect();
        ready(Ok(vectors))
    }
}
