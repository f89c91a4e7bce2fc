use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::openai::OpenAiConfig;
use crate::llm::{gemini, openai, Provider};

pub const CONFIG_PATH_ENV: &str = "RAG_CHAT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "rag-chat.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    /// Overrides the provider's default endpoint; for Ollama this is the host.
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_key: String::new(),
            base_url: None,
        }
    }
}

impl LlmConfig {
    pub fn to_provider(&self) -> Provider {
        match self.provider {
            ProviderKind::Gemini => Provider::Gemini(gemini::GeminiConfig {
                api_key: self.api_key.clone(),
                base_url: self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string()),
            }),
            ProviderKind::OpenAi => Provider::OpenAi(openai::OpenAiConfig {
                api_key: self.api_key.clone(),
                base_url: self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
            }),
            ProviderKind::Ollama => Provider::ollama(
                self.base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub embedding_model: String,
    pub generation_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_model: "text-embedding-004".to_string(),
            generation_model: "gemini-3-flash-preview".to_string(),
        }
    }
}

/// Retrieval and prompt-composition knobs, fixed for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Minimum cosine similarity (exclusive) for a document to be retrieved.
    pub match_threshold: f32,
    /// Maximum number of documents retrieved per question.
    pub match_count: usize,
    /// Number of trailing conversation turns injected into the prompt.
    pub history_window: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.3,
            match_count: 5,
            history_window: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    /// Embedded database used when no Supabase project is configured.
    pub sqlite_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_key: None,
            sqlite_path: PathBuf::from("rag-chat.db"),
        }
    }
}

impl StoreConfig {
    pub fn supabase(&self) -> Option<(&str, &str)> {
        match (&self.supabase_url, &self.supabase_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: openai::DEFAULT_BASE_URL.to_string(),
            model: "whisper-1".to_string(),
        }
    }
}

impl SpeechConfig {
    /// Endpoint for transcription. Falls back to the chat key when the chat
    /// provider is itself OpenAI; otherwise speech input is disabled.
    pub fn endpoint(&self, llm: &LlmConfig) -> Option<OpenAiConfig> {
        let api_key = match &self.api_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ if llm.provider == ProviderKind::OpenAi && !llm.api_key.is_empty() => {
                llm.api_key.clone()
            }
            _ => return None,
        };
        Some(OpenAiConfig {
            api_key,
            base_url: self.base_url.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub models: ModelConfig,
    pub rag: RagConfig,
    pub store: StoreConfig,
    pub speech: SpeechConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Defaults, then the TOML file (if present), then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Overlay environment values. `lookup` is `std::env::var` outside of tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("LLM_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "gemini" => self.llm.provider = ProviderKind::Gemini,
                "openai" => self.llm.provider = ProviderKind::OpenAi,
                "ollama" => self.llm.provider = ProviderKind::Ollama,
                other => tracing::warn!("Ignoring unknown LLM_PROVIDER {:?}", other),
            }
        }

        let key_vars: &[&str] = match self.llm.provider {
            ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderKind::OpenAi => &["OPENAI_API_KEY"],
            ProviderKind::Ollama => &[],
        };
        if let Some(key) = key_vars.iter().find_map(|var| lookup(*var)) {
            self.llm.api_key = key;
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.models.embedding_model = model;
        }
        if let Some(model) = lookup("GENERATION_MODEL") {
            self.models.generation_model = model;
        }
        if let Some(url) = lookup("SUPABASE_URL") {
            self.store.supabase_url = Some(url);
        }
        if let Some(key) = lookup("SUPABASE_KEY") {
            self.store.supabase_key = Some(key);
        }
        if let Some(path) = lookup("RAG_CHAT_DB_PATH") {
            self.store.sqlite_path = PathBuf::from(path);
        }
        if let Some(key) = lookup("SPEECH_API_KEY") {
            self.speech.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider != ProviderKind::Ollama && self.llm.api_key.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "no API key configured for provider {:?}",
                self.llm.provider
            )));
        }
        if !self.rag.match_threshold.is_finite() || !(-1.0..=1.0).contains(&self.rag.match_threshold)
        {
            return Err(ConfigError::Invalid(format!(
                "rag.match_threshold must be within [-1, 1], got {}",
                self.rag.match_threshold
            )));
        }
        if self.rag.match_count == 0 {
            return Err(ConfigError::Invalid("rag.match_count must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.rag.match_threshold, 0.3);
        assert_eq!(config.rag.match_count, 5);
        assert_eq!(config.rag.history_window, 4);
        assert_eq!(config.models.embedding_model, "text-embedding-004");
        assert_eq!(config.models.generation_model, "gemini-3-flash-preview");
        assert!(config.store.supabase().is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [rag]
            match_count = 3

            [llm]
            provider = "openai"
            "#,
        )
        .unwrap();
        assert_eq!(config.rag.match_count, 3);
        assert_eq!(config.rag.match_threshold, 0.3);
        assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag-chat.toml");
        std::fs::write(&path, "[models]\ngeneration_model = \"gemini-2.5-pro\"\n").unwrap();
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.models.generation_model, "gemini-2.5-pro");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("GOOGLE_API_KEY", "g-key"),
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "anon"),
            ("GENERATION_MODEL", "gemini-2.5-flash"),
        ]));
        assert_eq!(config.llm.api_key, "g-key");
        assert_eq!(config.models.generation_model, "gemini-2.5-flash");
        assert_eq!(
            config.store.supabase(),
            Some(("https://x.supabase.co", "anon"))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gemini_key_takes_precedence() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("GEMINI_API_KEY", "a"), ("GOOGLE_API_KEY", "b")]));
        assert_eq!(config.llm.api_key, "a");
    }

    #[test]
    fn test_validate_rejects_missing_key_and_bad_threshold() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.llm.api_key = "k".into();
        config.rag.match_threshold = 2.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.llm.provider = ProviderKind::Ollama;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_speech_endpoint_resolution() {
        let mut config = AppConfig::default();
        assert!(config.speech.endpoint(&config.llm).is_none());

        config.llm.provider = ProviderKind::OpenAi;
        config.llm.api_key = "sk-chat".into();
        assert_eq!(config.speech.endpoint(&config.llm).unwrap().api_key, "sk-chat");

        config.speech.api_key = Some("sk-speech".into());
        assert_eq!(
            config.speech.endpoint(&config.llm).unwrap().api_key,
            "sk-speech"
        );
    }
}
