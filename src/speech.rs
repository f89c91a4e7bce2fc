use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::llm::openai::OpenAiConfig;
use crate::llm::{check_status, LlmError};

/// Shown, and then asked as the question, when audio yields no words.
pub const UNRECOGNIZED_SPEECH: &str = "Sorry, I could not understand your speech.";

/// Remote speech-to-text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Raw transcript of `audio`; may be empty when nothing was recognised.
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String, LlmError>;
}

/// The text to treat as the user's question for a transcript.
pub fn question_from_transcript(transcript: &str) -> String {
    let text = transcript.trim();
    if text.is_empty() {
        UNRECOGNIZED_SPEECH.to_string()
    } else {
        text.to_string()
    }
}

/// OpenAI-compatible `audio/transcriptions` client.
pub struct WhisperTranscriber {
    client: Client,
    config: OpenAiConfig,
    model: String,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl WhisperTranscriber {
    pub fn new(client: Client, config: OpenAiConfig, model: String) -> Self {
        Self {
            client,
            config,
            model,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String, LlmError> {
        tracing::debug!(bytes = audio.len(), file_name, "transcribing audio");
        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", Part::bytes(audio).file_name(file_name.to_string()));

        let resp = self
            .config
            .post(&self.client, "audio/transcriptions")
            .multipart(form)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let data: TranscriptionResponse = resp.json().await?;
        Ok(data.text)
    }
}
