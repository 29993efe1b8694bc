//! Embedding client for an OpenAI-compatible `/embeddings` endpoint.
//!
//! Provider failures degrade to pseudo-random placeholder vectors so the
//! ingest pipeline still completes; the degradation is logged loudly and
//! is visible in stored data, not silently corrected.

use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const EMBED_TIMEOUT_SECS: u64 = 60;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Client for the external embedding provider.
#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl EmbeddingClient {
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: String,
        dimensions: usize,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(EMBED_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model,
            dimensions,
        }
    }

    /// Returns a clone of this client bound to a caller-supplied key
    /// (demo mode: chat requests may carry their own provider key).
    pub fn with_api_key(&self, api_key: String) -> Self {
        Self {
            api_key: Some(api_key),
            ..self.clone()
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embeds a batch of texts, one vector per input, in input order.
    ///
    /// Never fails: on any provider error the batch is replaced with
    /// placeholder vectors and a warning is logged. Storage still succeeds
    /// with the placeholders; correctness of retrieval is degraded until
    /// the document is reprocessed.
    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        match self.request_embeddings(texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(
                    "Embedding provider failed ({e}); falling back to placeholder vectors for {} texts",
                    texts.len()
                );
                placeholder_vectors(texts.len(), self.dimensions)
            }
        }
    }

    /// Embeds a single text (query path).
    pub async fn embed_one(&self, text: &str) -> Vec<f32> {
        let texts = [text.to_string()];
        self.embed(&texts)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| placeholder_vectors(1, self.dimensions).remove(0))
    }

    async fn request_embeddings(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no embedding API key configured"))?;

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("embedding request failed ({status}): {body}");
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|entry| entry.index);
        anyhow::ensure!(
            parsed.data.len() == texts.len(),
            "provider returned {} embeddings for {} inputs",
            parsed.data.len(),
            texts.len()
        );

        debug!("Embedded {} texts with model {}", texts.len(), self.model);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Uniform(-1, 1) vectors standing in for real embeddings when the
/// provider is unavailable.
pub fn placeholder_vectors(count: usize, dimensions: usize) -> Vec<Vec<f32>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| (0..dimensions).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_vectors_shape() {
        let vectors = placeholder_vectors(3, 1536);
        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 1536));
    }

    #[test]
    fn test_placeholder_vectors_unit_scale() {
        let vectors = placeholder_vectors(2, 64);
        for v in vectors {
            assert!(v.iter().all(|x| (-1.0..1.0).contains(x)));
        }
    }

    #[test]
    fn test_placeholder_vectors_empty_batch() {
        assert!(placeholder_vectors(0, 1536).is_empty());
    }

    #[tokio::test]
    async fn test_embed_empty_batch_is_empty() {
        let client = EmbeddingClient::new(
            None,
            "https://api.openai.com/v1",
            "text-embedding-3-small".to_string(),
            1536,
        );
        assert!(client.embed(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_embed_without_key_degrades_to_placeholders() {
        let client = EmbeddingClient::new(
            None,
            "https://api.openai.com/v1",
            "text-embedding-3-small".to_string(),
            8,
        );
        let vectors = client.embed(&["hello".to_string()]).await;
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].len(), 8);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = EmbeddingClient::new(None, "http://localhost:1234/v1/", "m".to_string(), 4);
        assert_eq!(client.endpoint, "http://localhost:1234/v1/embeddings");
    }
}
