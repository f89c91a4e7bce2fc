pub mod models;
pub mod sqlite;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use models::{Chat, DocumentMatch, Message, Role};

use crate::config::StoreConfig;

pub use sqlite::Database;
pub use supabase::SupabaseStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Store returned no row for {0}")]
    MissingRow(&'static str),
    #[error("Database lock poisoned")]
    Poisoned,
}

/// Chats, their messages and their document units.
///
/// Every message and document belongs to exactly one chat, and
/// `match_documents` only ever looks at the documents of `chat_id`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_chat(&self, title: &str) -> Result<Chat, StoreError>;

    /// All chats, newest first.
    async fn list_chats(&self) -> Result<Vec<Chat>, StoreError>;

    async fn update_chat_title(&self, chat_id: &str, title: &str) -> Result<(), StoreError>;

    /// Removes the chat together with its messages and documents.
    async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError>;

    async fn add_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError>;

    /// Messages of a chat in conversational order.
    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn insert_document(
        &self,
        chat_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError>;

    /// Up to `match_count` documents of `chat_id` whose cosine similarity to
    /// `query_embedding` exceeds `match_threshold`, most similar first.
    async fn match_documents(
        &self,
        query_embedding: &[f32],
        match_count: usize,
        match_threshold: f32,
        chat_id: &str,
    ) -> Result<Vec<DocumentMatch>, StoreError>;
}

/// Supabase when a project is configured, otherwise the embedded database.
pub fn open_store(config: &StoreConfig, client: reqwest::Client) -> Result<Arc<dyn Store>, StoreError> {
    match config.supabase() {
        Some((url, key)) => {
            tracing::info!("Using Supabase store at {}", url);
            Ok(Arc::new(SupabaseStore::new(client, url, key)))
        }
        None => {
            tracing::info!("Using SQLite store at {}", config.sqlite_path.display());
            Ok(Arc::new(Database::new(&config.sqlite_path)?))
        }
    }
}
