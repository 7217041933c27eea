//! Groq chat-completions client, the remote extraction collaborator.
//!
//! Speaks the OpenAI-style `/chat/completions` wire format. The response
//! content is returned as raw text; whether it actually contains JSON is
//! the parser's problem, not this client's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Extract, ExtractorError};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Model used when GROQ_MODEL is unset.
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";
const DEFAULT_TEMPERATURE: f32 = 0.5;
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// Remote extractor backed by Groq's chat-completions API.
///
/// Created once at startup and shared; holds the reqwest client and the
/// generation settings for the process lifetime.
pub struct GroqExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GroqExtractor {
    /// Build an extractor from the environment: `GROQ_API_KEY` (required),
    /// `GROQ_MODEL`, `GROQ_TEMPERATURE`, `GROQ_MAX_TOKENS`.
    pub fn from_env() -> Result<Self, ExtractorError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ExtractorError::MissingApiKey)?;

        let model =
            std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let temperature = std::env::var("GROQ_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TEMPERATURE);
        let max_tokens = std::env::var("GROQ_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        info!("Groq extractor configured (model: {})", model);

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            temperature,
            max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Extract for GroqExtractor {
    async fn extract(&self, prompt: &str) -> Result<String, ExtractorError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending {} byte prompt to Groq", prompt.len());

        let response = self
            .client
            .post(GROQ_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractorError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractorError::Api(format!("HTTP {}: {}", status, body)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ExtractorError::Api(format!("Malformed response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ExtractorError::EmptyResponse);
        }

        Ok(content)
    }
}
