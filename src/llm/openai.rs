use super::{check_status, LlmError};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl OpenAiConfig {
    /// POST to `{base_url}/{path}`, with a bearer token when one is configured.
    pub(crate) fn post(&self, client: &Client, path: &str) -> RequestBuilder {
        let req = client.post(format!("{}/{}", self.base_url.trim_end_matches('/'), path));
        if self.api_key.is_empty() {
            req
        } else {
            req.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

/// Send the whole prompt as one user turn and return the first choice's text.
pub async fn chat(
    client: &Client,
    config: &OpenAiConfig,
    model: &str,
    prompt: &str,
) -> Result<String, LlmError> {
    let body = OpenAiRequest {
        model,
        messages: vec![OpenAiMessage {
            role: "user".into(),
            content: Some(prompt.to_string()),
        }],
        stream: false,
    };

    let resp = config
        .post(client, "chat/completions")
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let data: OpenAiResponse = resp.json().await?;
    Ok(data
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}
