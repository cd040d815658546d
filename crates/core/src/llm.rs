use crate::traits::ChatCompletion;
use crate::{ChatMessage, CompletionRequest, LlmError, ModelInfo};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

const BACKEND: &str = "llm";

#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: String,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://0.0.0.0:4000".to_string(),
            api_key: Some("sk-1234".to_string()),
            default_model: "nvidia-gpt-oss-120b".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Client for an OpenAI-compatible chat completion endpoint (LiteLLM proxy or similar).
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    default_model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(config: LlmClientConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::new(),
            base_url: normalized_base(&config.base_url)?,
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            default_model: config.default_model,
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Chat models offered by the endpoint; embedding models are skipped.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let mut request = self.client.get(self.base_url.join("models")?);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(LlmError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("model listing returned {}", response.status()),
            });
        }

        let listing: ModelList = response.json().await?;
        Ok(chat_models(listing.data.into_iter().map(|entry| entry.id)))
    }
}

#[async_trait]
impl ChatCompletion for OpenAiCompatibleClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        request: &CompletionRequest,
    ) -> Result<String, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let body = ChatCompletionBody {
            model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let mut http = self
            .client
            .post(self.base_url.join("chat/completions")?)
            .json(&body);
        if let Some(api_key) = &self.api_key {
            http = http.bearer_auth(api_key);
        }

        let response = http.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(LlmError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{status}: {details}"),
            });
        }

        let payload: ChatCompletionResponse = response.json().await?;
        first_content(payload)
    }
}

/// Ensures a trailing slash so `Url::join` appends instead of replacing the last segment.
fn normalized_base(base_url: &str) -> Result<Url, LlmError> {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}

fn first_content(payload: ChatCompletionResponse) -> Result<String, LlmError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(LlmError::EmptyCompletion)
}

fn chat_models(ids: impl Iterator<Item = String>) -> Vec<ModelInfo> {
    ids.filter(|id| !id.to_lowercase().contains("embed"))
        .map(|id| ModelInfo {
            name: display_name(&id),
            id,
        })
        .collect()
}

/// `gpt-4o-mini` becomes `Gpt 4O Mini`.
fn display_name(id: &str) -> String {
    id.replace('-', " ")
        .split(' ')
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut result = String::with_capacity(word.len());
    let mut at_word_start = true;
    for ch in word.chars() {
        if at_word_start {
            result.extend(ch.to_uppercase());
        } else {
            result.extend(ch.to_lowercase());
        }
        at_word_start = !ch.is_alphabetic();
    }
    result
}
