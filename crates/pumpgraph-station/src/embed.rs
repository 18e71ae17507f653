//! Text embedding service client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::EmbedderConfig;
use crate::error::{Result, StationError};

/// Turns texts into fixed-length vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| StationError::Embedding("service returned no vectors".to_string()))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

/// Embedder backed by an HTTP service that accepts `{"inputs": [...]}` and
/// answers with a JSON array of vectors.
#[derive(Clone)]
pub struct HttpEmbedder {
    http: reqwest::Client,
    url: String,
}

impl HttpEmbedder {
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .http
            .post(&self.url)
            .json(&EmbedRequest { inputs: texts })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StationError::Embedding(format!("{status}: {body}")));
        }

        let vectors: Vec<Vec<f32>> = response.json().await?;
        if vectors.len() != texts.len() {
            return Err(StationError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        tracing::debug!(count = vectors.len(), "Embedded texts");
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Vec<f32>>);

    #[async_trait]
    impl Embedder for Fixed {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_request_body_shape() {
        let inputs = vec!["North".to_string(), "South".to_string()];
        let body = serde_json::to_value(EmbedRequest { inputs: &inputs }).unwrap();
        assert_eq!(body, serde_json::json!({ "inputs": ["North", "South"] }));
    }

    #[tokio::test]
    async fn test_embed_one_takes_the_vector() {
        let embedder = Fixed(vec![vec![0.5, 0.25]]);
        assert_eq!(embedder.embed_one("North").await.unwrap(), vec![0.5, 0.25]);
    }

    #[tokio::test]
    async fn test_embed_one_empty_response_is_error() {
        let embedder = Fixed(vec![]);
        assert!(matches!(
            embedder.embed_one("North").await,
            Err(StationError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_embedding_error() {
        let embedder = HttpEmbedder::new(&EmbedderConfig {
            url: "http://127.0.0.1:9/embed".to_string(),
            timeout_secs: 2,
        })
        .unwrap();
        assert!(matches!(
            embedder.embed(&["x".to_string()]).await,
            Err(StationError::Embedding(_))
        ));
    }
}
