//! Retrieval-augmented answering.
//!
//! Per user turn: retrieve chat-scoped documents for the question, render the
//! last few turns of the conversation, fold both into one prompt and hand it to
//! the generative model. Nothing is kept between turns.

pub mod ingest;
pub mod prompt;
pub mod retrieval;

use std::sync::Arc;

use crate::config::RagConfig;
use crate::db::models::Message;
use crate::db::Store;
use crate::embedding::Embedder;
use crate::llm::{Generator, LlmError};

pub use ingest::{IngestOutcome, Ingestor, Upload};
pub use retrieval::{NoContextReason, Retrieval, Retriever};

pub struct RagPipeline {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    history_window: usize,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn Store>,
        config: &RagConfig,
    ) -> Self {
        Self {
            retriever: Retriever::new(embedder, store, config),
            generator,
            history_window: config.history_window,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Prompt for `question` given the transcript so far.
    pub async fn build_prompt(
        &self,
        question: &str,
        history: &[Message],
        chat_id: &str,
    ) -> Result<String, LlmError> {
        let docs = self.retriever.retrieve(question, chat_id).await?;
        let context = prompt::render_history(history, self.history_window);
        Ok(prompt::compose_prompt(&context, &docs.text(), question))
    }

    /// Answer `question`; the model's text is returned as is.
    pub async fn answer(
        &self,
        question: &str,
        history: &[Message],
        chat_id: &str,
    ) -> Result<String, LlmError> {
        let prompt = self.build_prompt(question, history, chat_id).await?;
        self.generator.generate(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::Database;
    use crate::test_support::{RecordingGenerator, WordEmbedder};

    async fn pipeline_with(db: Arc<Database>) -> (RagPipeline, Arc<RecordingGenerator>) {
        let generator = Arc::new(RecordingGenerator::new("It is Paris."));
        let pipeline = RagPipeline::new(
            Arc::new(WordEmbedder),
            generator.clone(),
            db,
            &RagConfig::default(),
        );
        (pipeline, generator)
    }

    #[tokio::test]
    async fn test_answer_returns_model_text_verbatim() {
        let db = Arc::new(Database::in_memory().unwrap());
        let chat = db.create_chat("c").await.unwrap();
        let (pipeline, generator) = pipeline_with(db).await;

        let answer = pipeline.answer("What is the capital of France?", &[], &chat.id).await.unwrap();

        assert_eq!(answer, "It is Paris.");
        let prompt = generator.last_prompt();
        assert!(prompt.contains("Conversation context:\nNone\n"));
        assert!(prompt.contains("No relevant documents found."));
    }

    #[tokio::test]
    async fn test_prompt_includes_document_and_recent_turns() {
        let db = Arc::new(Database::in_memory().unwrap());
        let chat = db.create_chat("c").await.unwrap();
        let fact = "Paris is the capital of France.";
        db.insert_document(&chat.id, fact, &WordEmbedder.embed(fact).await.unwrap())
            .await
            .unwrap();
        let mut history = Vec::new();
        for (i, text) in ["one", "two", "three", "four", "What is the capital of France?"]
            .iter()
            .enumerate()
        {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            history.push(db.add_message(&chat.id, role, text).await.unwrap());
        }
        let (pipeline, generator) = pipeline_with(db).await;

        pipeline
            .answer("What is the capital of France?", &history, &chat.id)
            .await
            .unwrap();

        let prompt = generator.last_prompt();
        assert!(prompt.contains(prompt::INSTRUCTION_PREAMBLE));
        assert!(prompt.contains(&format!("Documents (Source of Truth):\n{}\n", fact)));
        assert!(prompt.contains(
            "Conversation context:\nassistant: two\nuser: three\nassistant: four\nuser: What is the capital of France?\n"
        ));
        assert!(!prompt.contains("user: one"));
    }
}
