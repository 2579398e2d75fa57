use std::sync::Arc;

use reqwest::{Client, Response};
use stepwise_model::{EmbeddingProvider, ErrorKind};

use crate::proto::{EmbeddingRequest, EmbeddingResponse};
use crate::{Error, OpenAIConfig};

/// Embeddings through the `/embeddings` endpoint of an OpenAI-compatible
/// API.
#[derive(Clone, Debug)]
pub struct OpenAIEmbedder {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIEmbedder {
    #[inline]
    pub(crate) fn from_parts(client: Client, config: Arc<OpenAIConfig>) -> Self {
        Self { client, config }
    }
}

impl EmbeddingProvider for OpenAIEmbedder {
    type Error = Error;

    fn embed(
        &self,
        inputs: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, Self::Error>> + Send + 'static
    {
        let expected = inputs.len();
        let resp_fut = self
            .client
            .post(self.config.endpoint("/embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingRequest {
                model: &self.config.embedding_model,
                input: inputs,
            })
            .send();

        async move {
            if expected == 0 {
                return Ok(vec![]);
            }
            let resp = resp_fut
                .await
                .and_then(Response::error_for_status)
                .map_err(Error::from_reqwest)?;
            let payload: EmbeddingResponse =
                resp.json().await.map_err(Error::from_reqwest)?;
            debug!("received {} embeddings", payload.data.len());
            collect_embeddings(payload, expected)
        }
    }
}

fn collect_embeddings(
    mut payload: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, Error> {
    if payload.data.len() != expected {
        return Err(Error::new(
            format!(
                "expected {expected} embeddings, got {}",
                payload.data.len()
            ),
            ErrorKind::Other,
        ));
    }
    payload.data.sort_by_key(|d| d.index);
    Ok(payload.data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeddings_sorted_by_index() {
        let payload: EmbeddingResponse = serde_json::from_str(
            r#"{"object":"list","data":[
                {"object":"embedding","index":1,"embedding":[0.5,0.5]},
                {"object":"embedding","index":0,"embedding":[1.0,0.0]}
            ],"model":"text-embedding-3-small"}"#,
        )
        .unwrap();
        let vectors = collect_embeddings(payload, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
    }

    #[test]
    fn test_embedding_count_mismatch() {
        let payload = EmbeddingResponse { data: vec![] };
        let err = collect_embeddings(payload, 1).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);
    }
}
