use sha2::{Digest, Sha256};

use crate::db::models::{Message, DEFAULT_CHAT_TITLE};
use crate::db::{Store, StoreError};

/// Identity of an upload for the "already processed" check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFingerprint {
    pub file_name: String,
    pub sha256: String,
}

impl UploadFingerprint {
    pub fn new(file_name: &str, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.to_string(),
            sha256: hex::encode(Sha256::digest(bytes)),
        }
    }
}

/// State of one interactive session: the active chat and its transcript.
///
/// Handlers receive it explicitly. It starts empty, is filled when a chat is
/// created or selected, and is cleared when the active chat is deleted.
#[derive(Debug, Default, Clone)]
pub struct SessionContext {
    pub chat_id: Option<String>,
    pub messages: Vec<Message>,
    pub last_upload: Option<UploadFingerprint>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `chat_id` active with its persisted transcript.
    pub fn activate(&mut self, chat_id: String, messages: Vec<Message>) {
        self.chat_id = Some(chat_id);
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.chat_id = None;
        self.messages.clear();
    }

    /// Active chat id, creating a fresh "New Chat" when there is none.
    pub async fn ensure_chat(&mut self, store: &dyn Store) -> Result<String, StoreError> {
        if let Some(id) = &self.chat_id {
            return Ok(id.clone());
        }
        let chat = store.create_chat(DEFAULT_CHAT_TITLE).await?;
        tracing::info!(chat_id = %chat.id, "created chat");
        self.activate(chat.id.clone(), Vec::new());
        Ok(chat.id)
    }

    pub fn is_duplicate_upload(&self, fingerprint: &UploadFingerprint) -> bool {
        self.last_upload.as_ref() == Some(fingerprint)
    }
}
