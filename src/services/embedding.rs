//! Text embedding: a remote OpenAI-compatible provider and a deterministic
//! offline fallback.
//!
//! The strategy is chosen once, from configuration, when the
//! [`EmbeddingProvider`] is built. Call sites only see [`Embedder`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::error::AppError;

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;
}

/// Digest-derived vectors for offline runs.
///
/// Not semantically meaningful, but pure: equal text always gives an equal
/// vector, across calls and across processes.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// SHA-256 of the text, bytes cycled to length, each mapped into
    /// `[-0.5, 0.5]`.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        digest
            .iter()
            .cycle()
            .take(self.dimensions)
            .map(|&b| f32::from(b) / 255.0 - 0.5)
            .collect()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Makes exactly one attempt per call. Transport and API errors surface as
/// [`AppError::Embedding`].
pub struct RemoteEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("treeline/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/embeddings", config.endpoint.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbeddingRequest<'a> {
        // Only the v3 models accept a requested dimensionality
        let dimensions = self
            .model
            .starts_with("text-embedding-3")
            .then_some(self.dimensions);
        EmbeddingRequest {
            model: &self.model,
            input: text,
            encoding_format: "float",
            dimensions,
        }
    }

    fn vector_from(&self, response: EmbeddingResponse) -> Result<Vec<f32>, AppError> {
        let vector = response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| AppError::Embedding("response contained no embedding".into()))?;

        if vector.len() != self.dimensions {
            return Err(AppError::Embedding(format!(
                "expected {} dimensions, provider returned {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.request(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiError>().await {
                Ok(api_error) => api_error.error.message,
                Err(_) => format!("HTTP {}", status),
            };
            return Err(AppError::Embedding(format!(
                "provider rejected request: {}",
                message
            )));
        }

        let body: EmbeddingResponse = response.json().await?;
        self.vector_from(body)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// The configured embedding strategy.
pub enum EmbeddingProvider {
    Remote(RemoteEmbedder),
    Fallback(HashEmbedder),
}

impl EmbeddingProvider {
    /// Remote when an API key is configured, otherwise the offline fallback.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, AppError> {
        match config.credential() {
            Some(api_key) => {
                tracing::info!(model = %config.model, "Using remote embedding provider");
                Ok(Self::Remote(RemoteEmbedder::new(config, api_key)?))
            }
            None => {
                tracing::warn!(
                    "No embedding API key configured; using deterministic offline vectors"
                );
                Ok(Self::Fallback(HashEmbedder::new(config.dimensions)))
            }
        }
    }

    #[cfg(test)]
    fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        match self {
            Self::Remote(remote) => remote.embed(text).await,
            Self::Fallback(hash) => hash.embed(text).await,
        }
    }

    fn dimensions(&self) -> usize {
        match self {
            Self::Remote(remote) => remote.dimensions(),
            Self::Fallback(hash) => hash.dimensions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[tokio::test]
    async fn test_hash_embedding_is_deterministic() {
        let embedder = HashEmbedder::new(1536);
        let a = embedder.embed("def greet(): pass").await.unwrap();
        let b = embedder.embed("def greet(): pass").await.unwrap();
        let c = embedder.embed("def greet(): return").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 1536);
    }

    #[test]
    fn test_hash_embedding_known_digest() {
        // sha256("") starts with 0xe3 0xb0
        let v = HashEmbedder::new(64).vector("");
        assert_eq!(v[0], 227.0 / 255.0 - 0.5);
        assert_eq!(v[1], 176.0 / 255.0 - 0.5);
    }

    #[test]
    fn test_hash_embedding_repeats_digest_and_stays_in_range() {
        let v = HashEmbedder::new(100).vector("class Greeter: pass");
        assert_eq!(v.len(), 100);
        for i in 0..(100 - 32) {
            assert_eq!(v[i], v[i + 32]);
        }
        assert!(v.iter().all(|x| (-0.5..=0.5).contains(x)));
    }

    #[test]
    fn test_provider_selection_follows_credential() {
        let offline = EmbeddingConfig::default();
        let provider = EmbeddingProvider::from_config(&offline).unwrap();
        assert!(!provider.is_remote());
        assert_eq!(provider.dimensions(), 1536);

        let online = EmbeddingConfig {
            api_key: Some("sk-test".into()),
            ..EmbeddingConfig::default()
        };
        assert!(EmbeddingProvider::from_config(&online).unwrap().is_remote());
    }

    fn remote_at(endpoint: &str, dimensions: usize) -> RemoteEmbedder {
        let config = EmbeddingConfig {
            endpoint: endpoint.into(),
            dimensions,
            ..EmbeddingConfig::default()
        };
        RemoteEmbedder::new(&config, "sk-test").unwrap()
    }

    fn remote(dimensions: usize) -> RemoteEmbedder {
        remote_at("http://localhost:9/v1/", dimensions)
    }

    /// Answers every request with a 500 carrying `body`. Returns the
    /// endpoint and the number of accepted connections.
    async fn failing_server(body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream).await;
                let response = format!(
                    "HTTP/1.1 500 Internal Server Error\r\n\
                     content-type: application/json\r\n\
                     content-length: {}\r\n\
                     connection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (format!("http://{}/v1", addr), accepted)
    }

    /// Reads headers and the declared body so the client sees a clean reply.
    async fn read_request(stream: &mut TcpStream) {
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            request.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    #[test]
    fn test_remote_request_shape() {
        let embedder = remote(3);
        assert_eq!(embedder.url, "http://localhost:9/v1/embeddings");

        let body = serde_json::to_value(embedder.request("hello")).unwrap();
        assert_eq!(body["input"], "hello");
        assert_eq!(body["model"], "text-embedding-3-small");
        assert_eq!(body["dimensions"], 3);
    }

    #[test]
    fn test_remote_response_parsing() {
        let embedder = remote(3);
        let ok: EmbeddingResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2,0.3]}],"model":"m"}"#,
        )
        .unwrap();
        assert_eq!(embedder.vector_from(ok).unwrap(), vec![0.1, 0.2, 0.3]);

        let short: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[0.1]}]}"#).unwrap();
        assert!(matches!(
            embedder.vector_from(short),
            Err(AppError::Embedding(_))
        ));

        let empty: EmbeddingResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(embedder.vector_from(empty).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_embedding_error() {
        let result = remote(3).embed("hello").await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_service_error_carries_provider_message_without_retry() {
        let (endpoint, accepted) =
            failing_server(r#"{"error":{"message":"overloaded","type":"server_error"}}"#).await;

        match remote_at(&endpoint, 3).embed("hello").await {
            Err(AppError::Embedding(message)) => {
                assert!(message.contains("overloaded"), "{}", message)
            }
            other => panic!("expected embedding error, got {:?}", other),
        }
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_service_error_without_json_body_reports_status() {
        let (endpoint, accepted) = failing_server("upstream exploded").await;

        match remote_at(&endpoint, 3).embed("hello").await {
            Err(AppError::Embedding(message)) => {
                assert!(message.contains("HTTP 500"), "{}", message)
            }
            other => panic!("expected embedding error, got {:?}", other),
        }
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }
}
