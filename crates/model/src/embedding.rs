use crate::provider::ModelProviderError;

/// A model that turns text into vectors for similarity search.
pub trait EmbeddingProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Embeds every input.
    ///
    /// The result has exactly one vector per input, in input order, and
    /// all vectors share the same dimension.
    fn embed(
        &self,
        inputs: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, Self::Error>> + Send + 'static;
}
