use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rag_chat_lib::commands::{chat, knowledge};
use rag_chat_lib::config::AppConfig;
use rag_chat_lib::db::{Database, Store};
use rag_chat_lib::embedding::Embedder;
use rag_chat_lib::llm::{Generator, LlmError};
use rag_chat_lib::rag::prompt::{INSTRUCTION_PREAMBLE, NO_DOCUMENTS_PLACEHOLDER};
use rag_chat_lib::rag::{IngestOutcome, Retrieval, Upload};
use rag_chat_lib::session::SessionContext;
use rag_chat_lib::state::AppState;

/// Word-count vectors: sentences sharing vocabulary are close.
struct Words;

#[async_trait]
impl Embedder for Words {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        const VOCAB: &[&str] = &[
            "paris", "capital", "france", "what", "is", "the", "of", "berlin", "germany",
            "spain", "madrid",
        ];
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() {
            return Err(LlmError::EmptyInput);
        }
        Ok(VOCAB
            .iter()
            .map(|v| words.iter().filter(|w| w == v).count() as f32)
            .collect())
    }
}

#[derive(Default)]
struct Recorder {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for Recorder {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("The capital of France is Paris.".to_string())
    }
}

impl Recorder {
    fn last(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap()
    }
}

fn app() -> (Arc<Database>, Arc<Recorder>, AppState) {
    let db = Arc::new(Database::in_memory().unwrap());
    let generator = Arc::new(Recorder::default());
    let state = AppState::from_parts(
        db.clone(),
        Arc::new(Words),
        generator.clone(),
        None,
        &AppConfig::default(),
    );
    (db, generator, state)
}

fn txt(name: &str, body: &str) -> Upload {
    Upload {
        file_name: name.to_string(),
        mime: Some("text/plain".to_string()),
        bytes: body.as_bytes().to_vec(),
    }
}

#[tokio::test]
async fn uploaded_fact_grounds_the_answer() {
    let (_db, generator, state) = app();
    let mut ctx = SessionContext::new();
    let fact = "Paris is the capital of France.";

    let outcome = knowledge::upload_document(&state, &mut ctx, txt("france.txt", fact))
        .await
        .unwrap();
    assert!(matches!(outcome, IngestOutcome::Stored { .. }));

    let chat_id = ctx.chat_id.clone().unwrap();
    let retrieved = state
        .pipeline
        .retriever()
        .retrieve("What is the capital of France?", &chat_id)
        .await
        .unwrap();
    assert_eq!(retrieved, Retrieval::Found(vec![fact.to_string()]));

    let reply = chat::send_message(&state, &mut ctx, "What is the capital of France?")
        .await
        .unwrap();
    assert_eq!(reply.content, "The capital of France is Paris.");

    let prompt = generator.last();
    assert!(prompt.starts_with(INSTRUCTION_PREAMBLE));
    assert!(prompt.contains(&format!("Documents (Source of Truth):\n{}\n", fact)));
    assert!(prompt.contains("assistant: 📄 Uploaded: france.txt\nuser: What is the capital of France?\n"));
}

#[tokio::test]
async fn document_is_found_by_its_own_text() {
    let (_db, _generator, state) = app();
    let mut ctx = SessionContext::new();
    let text = "Berlin is the capital of Germany.";
    knowledge::upload_document(&state, &mut ctx, txt("germany.txt", text))
        .await
        .unwrap();

    let retrieved = state
        .pipeline
        .retriever()
        .retrieve(text, ctx.chat_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(retrieved.text(), text);
}

#[tokio::test]
async fn fresh_question_uses_placeholders() {
    let (_db, generator, state) = app();
    let mut ctx = SessionContext::new();

    chat::send_message(&state, &mut ctx, "What is the capital of France?")
        .await
        .unwrap();

    let prompt = generator.last();
    assert!(prompt.contains(&format!("Documents (Source of Truth):\n{}\n", NO_DOCUMENTS_PLACEHOLDER)));
    assert!(prompt.contains("Conversation context:\nuser: What is the capital of France?\n"));
}

#[tokio::test]
async fn prompt_without_any_history_reads_none() {
    let (db, generator, state) = app();
    let chat = db.create_chat("New Chat").await.unwrap();

    state
        .pipeline
        .answer("What is the capital of France?", &[], &chat.id)
        .await
        .unwrap();

    let prompt = generator.last();
    assert!(prompt.contains("Conversation context:\nNone\n"));
    assert!(prompt.contains(NO_DOCUMENTS_PLACEHOLDER));
}

#[tokio::test]
async fn documents_never_leak_across_chats() {
    let (_db, generator, state) = app();
    let mut france = SessionContext::new();
    let mut other = SessionContext::new();

    knowledge::upload_document(&state, &mut france, txt("france.txt", "Paris is the capital of France."))
        .await
        .unwrap();
    chat::send_message(&state, &mut other, "What is the capital of France?")
        .await
        .unwrap();

    assert_ne!(france.chat_id, other.chat_id);
    let prompt = generator.last();
    assert!(!prompt.contains("Paris is the capital of France."));
    assert!(prompt.contains(NO_DOCUMENTS_PLACEHOLDER));
}

#[tokio::test]
async fn repeated_upload_writes_nothing_until_renamed() {
    let (db, _generator, state) = app();
    let mut ctx = SessionContext::new();
    let body = "Madrid is the capital of Spain.";

    knowledge::upload_document(&state, &mut ctx, txt("spain.txt", body)).await.unwrap();
    let chat_id = ctx.chat_id.clone().unwrap();
    let before = db.get_messages(&chat_id).await.unwrap().len();

    let again = knowledge::upload_document(&state, &mut ctx, txt("spain.txt", body)).await.unwrap();
    assert_eq!(again, IngestOutcome::Duplicate);
    assert_eq!(db.count_documents(&chat_id).unwrap(), 1);
    assert_eq!(db.get_messages(&chat_id).await.unwrap().len(), before);

    let renamed = knowledge::upload_document(&state, &mut ctx, txt("spain-copy.txt", body))
        .await
        .unwrap();
    assert!(matches!(renamed, IngestOutcome::Stored { .. }));
    assert_eq!(db.count_documents(&chat_id).unwrap(), 2);
}

#[tokio::test]
async fn deleting_a_chat_removes_it_and_its_messages() {
    let (db, _generator, state) = app();
    let mut ctx = SessionContext::new();
    chat::send_message(&state, &mut ctx, "What is the capital of France?")
        .await
        .unwrap();
    let chat_id = ctx.chat_id.clone().unwrap();

    chat::delete_chat(&state, &mut ctx, &chat_id).await.unwrap();

    assert!(db.get_messages(&chat_id).await.unwrap().is_empty());
    assert!(chat::list_chats(&state)
        .await
        .unwrap()
        .iter()
        .all(|c| c.id != chat_id));
    assert!(ctx.chat_id.is_none());
}
