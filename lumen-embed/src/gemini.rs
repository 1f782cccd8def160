//! Remote embeddings through the Google Generative Language API.
//!
//! Texts are sent to the `batchEmbedContents` endpoint in groups of at most
//! [`EmbedConfig::batch_size`]. Corpus chunks are embedded with the `RETRIEVAL_DOCUMENT`
//! task type and search queries with `RETRIEVAL_QUERY`, which is what the model expects
//! for asymmetric retrieval.

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, l2_normalize};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a text will be used, as understood by the embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    status: Option<String>,
}

/// Embedding provider backed by Gemini embedding models.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    config: EmbedConfig,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("config", &self.config)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiProvider {
    /// Creates a provider with an explicit API key.
    pub fn new(config: EmbedConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    /// Creates a provider reading the API key from the variable named by
    /// `config.api_key_env`.
    pub fn from_env(config: EmbedConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| EmbedError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;
        Self::new(config, api_key)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/{}:batchEmbedContents",
            self.config.base_url.trim_end_matches('/'),
            model_path(&self.config.model_name)
        )
    }

    async fn embed_batch(&self, texts: &[String], task_type: TaskType) -> Result<Vec<Vec<f32>>> {
        let model = model_path(&self.config.model_name);
        let request = build_request(&model, texts, task_type);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let parsed: BatchEmbedResponse = response.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::ResponseLength {
                expected: texts.len(),
                actual: parsed.embeddings.len(),
            });
        }

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }

    async fn embed_with_task(&self, texts: &[String], task_type: TaskType) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return EmbeddingResult::new(vec![]);
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for (batch_no, batch) in texts.chunks(self.config.batch_size).enumerate() {
            tracing::debug!(
                "Embedding batch {} ({} texts) with {}",
                batch_no,
                batch.len(),
                self.config.model_name
            );
            all_embeddings.extend(self.embed_batch(batch, task_type).await?);
        }

        if self.config.normalize {
            for embedding in &mut all_embeddings {
                l2_normalize(embedding);
            }
        }

        EmbeddingResult::for_inputs(all_embeddings, texts.len())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        self.embed_with_task(texts, TaskType::RetrievalDocument).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self
            .embed_with_task(&[text.to_string()], TaskType::RetrievalQuery)
            .await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or(EmbedError::ResponseLength {
                expected: 1,
                actual: 0,
            })
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// The API addresses models as `models/<id>`; accept bare ids too.
fn model_path(model_name: &str) -> String {
    if model_name.starts_with("models/") {
        model_name.to_string()
    } else {
        format!("models/{model_name}")
    }
}

fn build_request<'a>(model: &'a str, texts: &'a [String], task_type: TaskType) -> BatchEmbedRequest<'a> {
    BatchEmbedRequest {
        requests: texts
            .iter()
            .map(|text| EmbedContentRequest {
                model,
                content: Content {
                    parts: vec![Part { text }],
                },
                task_type,
            })
            .collect(),
    }
}

fn api_error(status: u16, body: &str) -> EmbedError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(code) => format!("{code}: {}", parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) if body.is_empty() => "empty response body".to_string(),
        Err(_) => body.to_string(),
    };
    EmbedError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path() {
        assert_eq!(model_path("models/text-embedding-004"), "models/text-embedding-004");
        assert_eq!(model_path("text-embedding-004"), "models/text-embedding-004");
    }

    #[test]
    fn test_request_serialization() {
        let texts = vec!["first".to_string(), "second".to_string()];
        let request = build_request("models/text-embedding-004", &texts, TaskType::RetrievalDocument);
        let json = serde_json::to_value(&request).unwrap();

        let requests = json["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["model"], "models/text-embedding-004");
        assert_eq!(requests[0]["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(requests[1]["content"]["parts"][0]["text"], "second");
    }

    #[test]
    fn test_query_task_type_serialization() {
        let json = serde_json::to_value(TaskType::RetrievalQuery).unwrap();
        assert_eq!(json, "RETRIEVAL_QUERY");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"embeddings": [{"values": [0.1, 0.2]}, {"values": [0.3, 0.4]}]}"#;
        let parsed: BatchEmbedResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.embeddings.len(), 2);
        assert_eq!(parsed.embeddings[1].values, vec![0.3, 0.4]);
    }

    #[test]
    fn test_api_error_parsing() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        match api_error(400, body) {
            EmbedError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "INVALID_ARGUMENT: API key not valid.");
            }
            other => panic!("unexpected error: {other}"),
        }

        match api_error(503, "upstream unavailable") {
            EmbedError::Api { message, .. } => assert_eq!(message, "upstream unavailable"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_env_requires_key() {
        let config = EmbedConfig {
            api_key_env: "LUMEN_TEST_UNSET_GEMINI_KEY".to_string(),
            ..EmbedConfig::gemini()
        };
        match GeminiProvider::from_env(config) {
            Err(EmbedError::MissingApiKey { var }) => assert_eq!(var, "LUMEN_TEST_UNSET_GEMINI_KEY"),
            other => panic!("expected MissingApiKey, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let provider = GeminiProvider::new(
            EmbedConfig::gemini().with_base_url("http://127.0.0.1:9"),
            "unused",
        )
        .unwrap();

        let result = provider.embed_texts(&[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    #[ignore] // Calls the live API: GOOGLE_API_KEY=... cargo test -p lumen-embed gemini -- --ignored
    async fn test_live_embeddings() -> Result<()> {
        let provider = GeminiProvider::from_env(EmbedConfig::gemini())?;
        let texts = vec![
            "Reset your password by visiting /reset.".to_string(),
            "Contact support at help@co.com for billing issues.".to_string(),
        ];

        let documents = provider.embed_texts(&texts).await?;
        assert_eq!(documents.len(), 2);
        assert_eq!(documents.dimension, 768);

        let query = provider.embed_text("how do I reset my password").await?;
        assert_eq!(query.len(), documents.dimension);
        Ok(())
    }
}
