use super::{check_status, LlmError};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl GeminiConfig {
    /// POST to `{base_url}/models/{model}:{method}` with the API key header.
    pub(crate) fn post(&self, client: &Client, model: &str, method: &str) -> RequestBuilder {
        client
            .post(format!(
                "{}/models/{}:{}",
                self.base_url.trim_end_matches('/'),
                model,
                method
            ))
            .header("x-goog-api-key", &self.api_key)
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub(crate) fn text(text: &str) -> Self {
        Content {
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// `models/{model}:generateContent` with a single text part.
///
/// The text of every part of the first candidate is concatenated, matching how
/// the SDKs expose `response.text`. A response without candidates yields an
/// empty string rather than an error.
pub async fn generate_content(
    client: &Client,
    config: &GeminiConfig,
    model: &str,
    prompt: &str,
) -> Result<String, LlmError> {
    let body = GenerateRequest {
        contents: vec![Content::text(prompt)],
    };

    let resp = config
        .post(client, model, "generateContent")
        .json(&body)
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let data: GenerateResponse = resp.json().await?;
    Ok(first_candidate_text(data))
}

fn first_candidate_text(data: GenerateResponse) -> String {
    data.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}
