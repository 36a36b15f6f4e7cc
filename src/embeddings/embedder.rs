//! Text embedding through the Google Generative Language API.

use crate::types::{AppError, AppResult};
use crate::utils::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding model, recorded alongside persisted vectors.
    fn model_name(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>>;
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
}

pub struct GoogleEmbedder {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    batch_size: usize,
    retry: RetryPolicy,
}

impl GoogleEmbedder {
    pub fn new(api_key: &str, api_base: &str, model: &str) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };

        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            batch_size: 100,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request<'a>(&'a self, text: &'a str, task_type: TaskType) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: vec![Part { text }],
            },
            task_type,
        }
    }

    async fn post<B, R>(&self, method: &str, body: &B) -> AppResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}:{}", self.api_base, self.model, method);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Transport {
                service: "Embedding",
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(AppError::Http {
                service: "Embedding",
                status,
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse embedding response: {}", e)))
    }
}

#[async_trait]
impl Embedder for GoogleEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            let body = BatchEmbedContentsRequest {
                requests: batch
                    .iter()
                    .map(|text| self.request(text, TaskType::RetrievalDocument))
                    .collect(),
            };

            let response: BatchEmbedContentsResponse =
                with_retry(self.retry, || self.post("batchEmbedContents", &body)).await?;

            if response.embeddings.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Expected {} embeddings, received {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            debug!(batch = batch_index, size = batch.len(), "Embedded document batch");
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let body = self.request(text, TaskType::RetrievalQuery);
        let response: EmbedContentResponse =
            with_retry(self.retry, || self.post("embedContent", &body)).await?;
        Ok(response.embedding.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn embedder(server: &mockito::ServerGuard) -> GoogleEmbedder {
        GoogleEmbedder::new("test-key", &server.url(), "embedding-001")
            .with_retry_policy(RetryPolicy::new(1).with_base_delay(Duration::from_millis(1)))
    }

    #[test]
    fn test_model_name_is_prefixed() {
        let e = GoogleEmbedder::new("k", "http://localhost", "embedding-001");
        assert_eq!(e.model_name(), "models/embedding-001");
        let e = GoogleEmbedder::new("k", "http://localhost", "models/text-embedding-004");
        assert_eq!(e.model_name(), "models/text-embedding-004");
    }

    #[tokio::test]
    async fn test_embed_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/embedding-001:embedContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""taskType":"RETRIEVAL_QUERY""#.to_string()),
                Matcher::Regex(r#""text":"calories""#.to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"embedding":{"values":[0.5,0.25,-1.0]}}"#)
            .create_async()
            .await;

        let vector = embedder(&server).embed_query("calories").await.unwrap();
        assert_eq!(vector, vec![0.5, 0.25, -1.0]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embed_documents_in_batches() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/models/embedding-001:batchEmbedContents")
            .match_body(Matcher::Regex(r#""text":"a""#.to_string()))
            .with_status(200)
            .with_body(r#"{"embeddings":[{"values":[1.0,0.0]},{"values":[0.0,1.0]}]}"#)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/models/embedding-001:batchEmbedContents")
            .match_body(Matcher::Regex(r#""text":"c""#.to_string()))
            .with_status(200)
            .with_body(r#"{"embeddings":[{"values":[1.0,1.0]}]}"#)
            .create_async()
            .await;

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = embedder(&server)
            .with_batch_size(2)
            .embed_documents(&texts)
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_embedding_count_mismatch_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/embedding-001:batchEmbedContents")
            .with_status(200)
            .with_body(r#"{"embeddings":[{"values":[1.0]}]}"#)
            .create_async()
            .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let result = embedder(&server).embed_documents(&texts).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_api_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/embedding-001:embedContent")
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#)
            .expect(1)
            .create_async()
            .await;

        let err = embedder(&server).embed_query("x").await.unwrap_err();
        assert!(err.to_string().contains("API key not valid"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/embedding-001:embedContent")
            .with_status(503)
            .with_body("unavailable")
            .expect(2)
            .create_async()
            .await;

        let result = embedder(&server).embed_query("x").await;
        assert!(result.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried_whatever_the_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/embedding-001:embedContent")
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"upstream request failed (503)","status":"INVALID_ARGUMENT"}}"#)
            .expect(1)
            .create_async()
            .await;

        let err = embedder(&server).embed_query("x").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Http { status, .. } if status == reqwest::StatusCode::BAD_REQUEST
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unusual_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/embedding-001:embedContent")
            .with_status(505)
            .with_body("version not supported")
            .expect(2)
            .create_async()
            .await;

        let result = embedder(&server).embed_query("x").await;
        assert!(result.is_err());
        mock.assert_async().await;
    }
}
