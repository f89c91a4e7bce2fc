use crate::llm::gemini::{Content, GeminiConfig};
use crate::llm::openai::OpenAiConfig;
use crate::llm::{check_status, LlmError, ModelGateway, Provider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Maps text to a fixed-length vector through a remote embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

#[async_trait]
impl Embedder for ModelGateway {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if text.trim().is_empty() {
            return Err(LlmError::EmptyInput);
        }
        let model = &self.models.embedding_model;
        tracing::debug!(provider = self.provider.name(), %model, chars = text.len(), "embedding text");
        match &self.provider {
            Provider::Gemini(config) => embed_content(&self.client, config, model, text).await,
            Provider::OpenAi(config) | Provider::Ollama(config) => {
                let mut embeddings =
                    generate_embeddings(&self.client, config, &[text.to_string()], model).await?;
                if embeddings.is_empty() {
                    return Err(LlmError::Parse("embedding response had no data".into()));
                }
                Ok(embeddings.swap_remove(0))
            }
        }
    }
}

#[derive(Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Embed one text with Gemini's `embedContent` method
pub async fn embed_content(
    client: &Client,
    config: &GeminiConfig,
    model: &str,
    text: &str,
) -> Result<Vec<f32>, LlmError> {
    let body = EmbedContentRequest {
        model: format!("models/{}", model),
        content: Content::text(text),
    };

    let resp = config
        .post(client, model, "embedContent")
        .json(&body)
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let data: EmbedContentResponse = resp.json().await?;
    Ok(data.embedding.values)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Generate embeddings for a list of texts using the OpenAI-compatible API
pub async fn generate_embeddings(
    client: &Client,
    config: &OpenAiConfig,
    texts: &[String],
    model: &str,
) -> Result<Vec<Vec<f32>>, LlmError> {
    let body = EmbeddingRequest {
        model,
        input: texts,
    };

    let resp = config
        .post(client, "embeddings")
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let data: EmbeddingResponse = resp.json().await?;
    Ok(data.data.into_iter().map(|d| d.embedding).collect())
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rank candidates against a query embedding.
///
/// Keeps candidates whose similarity is strictly above `threshold`, best first,
/// at most `top_k` of them. Equal scores keep their input order.
pub fn rank_by_similarity<T>(
    query_embedding: &[f32],
    candidates: Vec<(T, Vec<f32>)>,
    threshold: f32,
    top_k: usize,
) -> Vec<(T, f32)> {
    let mut scored: Vec<(T, f32)> = candidates
        .into_iter()
        .map(|(item, emb)| {
            let score = cosine_similarity(query_embedding, &emb);
            (item, score)
        })
        .filter(|(_, score)| *score > threshold)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

/// Serialize embedding to bytes for SQLite BLOB storage
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

/// Deserialize embedding from SQLite BLOB bytes
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_mismatched_or_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_rank_filters_and_orders() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            ("weak", vec![0.2, 1.0]),
            ("exact", vec![1.0, 0.0]),
            ("close", vec![1.0, 0.5]),
            ("opposite", vec![-1.0, 0.0]),
        ];
        let ranked = rank_by_similarity(&query, candidates, 0.3, 5);
        let names: Vec<&str> = ranked.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["exact", "close"]);
    }

    #[test]
    fn test_rank_threshold_is_strict_and_truncates() {
        let query = vec![1.0, 0.0];
        let candidates: Vec<(usize, Vec<f32>)> = (0..8).map(|i| (i, vec![1.0, 0.0])).collect();
        let ranked = rank_by_similarity(&query, candidates.clone(), 0.3, 5);
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].0, 0);

        assert!(rank_by_similarity(&query, candidates, 1.0, 5).is_empty());
    }

    #[test]
    fn test_embedding_roundtrip() {
        let emb = vec![0.1, 0.2, -0.3, 0.4];
        let bytes = embedding_to_bytes(&emb);
        let back = bytes_to_embedding(&bytes);
        assert_eq!(emb, back);
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected_before_any_request() {
        let gateway = ModelGateway::new(
            Client::new(),
            Provider::gemini("unused".into()),
            ModelConfig::default(),
        );
        let err = gateway.embed("   \n").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyInput));
    }

    #[test]
    fn test_embed_content_request_shape() {
        let body = EmbedContentRequest {
            model: "models/text-embedding-004".into(),
            content: Content::text("hello"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "models/text-embedding-004");
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
    }
}
