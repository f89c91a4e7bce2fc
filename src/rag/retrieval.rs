use std::sync::Arc;

use crate::config::RagConfig;
use crate::db::Store;
use crate::embedding::Embedder;
use crate::llm::LlmError;

/// Why a question ended up without document context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoContextReason {
    /// The chat has no document above the similarity threshold.
    NoMatches,
    /// The similarity search itself failed; treated like `NoMatches`.
    StoreFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    Found(Vec<String>),
    NoContext(NoContextReason),
}

impl Retrieval {
    /// Passages separated by a blank line, or the empty string.
    pub fn text(&self) -> String {
        match self {
            Retrieval::Found(passages) => passages.join("\n\n"),
            Retrieval::NoContext(_) => String::new(),
        }
    }
}

/// Chat-scoped similarity search over stored document units.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn Store>,
    match_count: usize,
    match_threshold: f32,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn Store>, config: &RagConfig) -> Self {
        Self {
            embedder,
            store,
            match_count: config.match_count,
            match_threshold: config.match_threshold,
        }
    }

    /// Embed `query` and fetch the closest documents of `chat_id`.
    ///
    /// Embedding failures propagate. A failed or empty search is not an error.
    pub async fn retrieve(&self, query: &str, chat_id: &str) -> Result<Retrieval, LlmError> {
        let query_embedding = self.embedder.embed(query).await?;

        let rows = match self
            .store
            .match_documents(&query_embedding, self.match_count, self.match_threshold, chat_id)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(%chat_id, "document search failed, answering without documents: {}", e);
                return Ok(Retrieval::NoContext(NoContextReason::StoreFailed(e.to_string())));
            }
        };

        if rows.is_empty() {
            tracing::debug!(%chat_id, "no documents above threshold");
            return Ok(Retrieval::NoContext(NoContextReason::NoMatches));
        }

        tracing::debug!(
            %chat_id,
            matches = rows.len(),
            best = rows[0].similarity,
            "retrieved documents"
        );
        Ok(Retrieval::Found(rows.into_iter().map(|r| r.content).collect()))
    }
}
