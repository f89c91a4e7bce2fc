pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use reqwest::{Client, Response};

use crate::config::ModelConfig;

/// Single-shot text generation: one prompt in, the model's text out.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Unified LLM provider enum. Dispatches to Gemini or OpenAI-compatible backends.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(gemini::GeminiConfig),
    OpenAi(openai::OpenAiConfig),
    Ollama(openai::OpenAiConfig),
}

impl Provider {
    pub fn gemini(api_key: String) -> Self {
        Provider::Gemini(gemini::GeminiConfig {
            api_key,
            base_url: gemini::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn openai(api_key: String) -> Self {
        Provider::OpenAi(openai::OpenAiConfig {
            api_key,
            base_url: openai::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn ollama(host: String) -> Self {
        Provider::Ollama(openai::OpenAiConfig {
            api_key: String::new(),
            base_url: format!("{}/v1", host.trim_end_matches('/')),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini(_) => "gemini",
            Provider::OpenAi(_) => "openai",
            Provider::Ollama(_) => "ollama",
        }
    }

    pub async fn generate(
        &self,
        client: &Client,
        model: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        match self {
            Provider::Gemini(config) => gemini::generate_content(client, config, model, prompt).await,
            Provider::OpenAi(config) | Provider::Ollama(config) => {
                openai::chat(client, config, model, prompt).await
            }
        }
    }
}

/// A provider bound to the embedding and generation model ids it serves.
///
/// One `reqwest::Client` is shared by every call so connections are pooled.
#[derive(Debug, Clone)]
pub struct ModelGateway {
    pub(crate) client: Client,
    pub(crate) provider: Provider,
    pub(crate) models: ModelConfig,
}

impl ModelGateway {
    pub fn new(client: Client, provider: Provider, models: ModelConfig) -> Self {
        Self {
            client,
            provider,
            models,
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }
}

#[async_trait]
impl Generator for ModelGateway {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        tracing::debug!(
            provider = self.provider.name(),
            model = %self.models.generation_model,
            prompt_chars = prompt.len(),
            "generating answer"
        );
        self.provider
            .generate(&self.client, &self.models.generation_model, prompt)
            .await
    }
}

/// Turn a non-2xx response into `LlmError::Api`, keeping the body as the message.
pub(crate) async fn check_status(resp: Response) -> Result<Response, LlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    Err(LlmError::Api { status, message })
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Cannot embed empty text")]
    EmptyInput,
}
