use std::path::Path;

use crate::doc_processor::FileKind;
use crate::error::AppError;
use crate::rag::{IngestOutcome, Upload};
use crate::session::SessionContext;
use crate::state::AppState;

pub async fn upload_document(
    state: &AppState,
    ctx: &mut SessionContext,
    upload: Upload,
) -> Result<IngestOutcome, AppError> {
    state.ingestor.ingest(ctx, &upload).await
}

/// Read a local file and upload it, reporting its MIME type from the extension.
pub async fn upload_file(
    state: &AppState,
    ctx: &mut SessionContext,
    path: &Path,
) -> Result<IngestOutcome, AppError> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let upload = Upload {
        file_name,
        mime: FileKind::mime_for_path(path).map(str::to_string),
        bytes,
    };
    upload_document(state, ctx, upload).await
}
