use std::sync::Arc;

use crate::db::models::Role;
use crate::db::Store;
use crate::doc_processor::{self, FileKind};
use crate::embedding::Embedder;
use crate::error::AppError;
use crate::session::{SessionContext, UploadFingerprint};

/// A file handed over by the user.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored as one document unit of `chat_id`.
    Stored { chat_id: String },
    /// Same file as the previous upload of this session; nothing written.
    Duplicate,
    /// Not a TXT, PDF or DOCX file; nothing written.
    Unsupported,
    /// The file contained no text to embed; nothing written.
    Empty,
}

pub fn upload_notice(file_name: &str) -> String {
    format!("📄 Uploaded: {}", file_name)
}

/// Turns uploads into embedded, chat-scoped document units.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn Store>,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn Store>) -> Self {
        Self { embedder, store }
    }

    /// Extract, embed and store `upload` for the session's chat.
    ///
    /// The whole text becomes a single unit. A notice is appended to the
    /// transcript, both persisted and in `ctx.messages`.
    pub async fn ingest(
        &self,
        ctx: &mut SessionContext,
        upload: &Upload,
    ) -> Result<IngestOutcome, AppError> {
        let fingerprint = UploadFingerprint::new(&upload.file_name, &upload.bytes);
        if ctx.is_duplicate_upload(&fingerprint) {
            tracing::debug!(file = %upload.file_name, "upload already processed");
            return Ok(IngestOutcome::Duplicate);
        }

        let Some(kind) = FileKind::detect(&upload.file_name, upload.mime.as_deref()) else {
            tracing::debug!(
                file = %upload.file_name,
                mime = ?upload.mime,
                "ignoring unsupported upload"
            );
            return Ok(IngestOutcome::Unsupported);
        };

        let text = doc_processor::extract_text(kind, &upload.bytes)?;
        if text.trim().is_empty() {
            tracing::warn!(file = %upload.file_name, "no extractable text in upload");
            return Ok(IngestOutcome::Empty);
        }

        let chat_id = ctx.ensure_chat(self.store.as_ref()).await?;
        let embedding = self.embedder.embed(&text).await?;
        self.store.insert_document(&chat_id, &text, &embedding).await?;

        let notice = self
            .store
            .add_message(&chat_id, Role::Assistant, &upload_notice(&upload.file_name))
            .await?;
        ctx.messages.push(notice);
        ctx.last_upload = Some(fingerprint);

        tracing::info!(
            %chat_id,
            file = %upload.file_name,
            kind = ?kind,
            chars = text.len(),
            dims = embedding.len(),
            "document ingested"
        );
        Ok(IngestOutcome::Stored { chat_id })
    }
}
