use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{self, Store};
use crate::embedding::Embedder;
use crate::error::AppError;
use crate::llm::{Generator, ModelGateway};
use crate::rag::{Ingestor, RagPipeline};
use crate::speech::{Transcriber, WhisperTranscriber};

/// Everything a handler needs, built once at startup.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub pipeline: RagPipeline,
    pub ingestor: Ingestor,
    pub transcriber: Option<Arc<dyn Transcriber>>,
}

impl AppState {
    pub fn initialize(config: &AppConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::new();
        let store = db::open_store(&config.store, client.clone())?;

        let gateway = Arc::new(ModelGateway::new(
            client.clone(),
            config.llm.to_provider(),
            config.models.clone(),
        ));
        tracing::info!(
            provider = gateway.provider().name(),
            embedding_model = %config.models.embedding_model,
            generation_model = %config.models.generation_model,
            "model gateway ready"
        );

        let transcriber = config.speech.endpoint(&config.llm).map(|endpoint| {
            Arc::new(WhisperTranscriber::new(client, endpoint, config.speech.model.clone()))
                as Arc<dyn Transcriber>
        });
        if transcriber.is_none() {
            tracing::info!("speech input disabled: no transcription key configured");
        }

        Ok(Self::from_parts(store, gateway.clone(), gateway, transcriber, config))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        transcriber: Option<Arc<dyn Transcriber>>,
        config: &AppConfig,
    ) -> Self {
        Self {
            pipeline: RagPipeline::new(embedder.clone(), generator, store.clone(), &config.rag),
            ingestor: Ingestor::new(embedder, store.clone()),
            store,
            transcriber,
        }
    }
}
