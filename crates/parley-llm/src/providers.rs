//! LLM Provider implementations

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Get the provider kind
    fn kind(&self) -> ProviderKind;

    /// Complete a conversation
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Map a non-success HTTP response to an error
async fn status_error(response: reqwest::Response) -> LLMError {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_seconds = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        return LLMError::RateLimited {
            retry_after_seconds,
        };
    }
    let body = response.text().await.unwrap_or_default();
    LLMError::RequestFailed {
        message: format!("HTTP {}: {}", status, body),
    }
}

// ============================================================================
// Groq Provider (OpenAI-compatible chat completions)
// ============================================================================

/// Default Groq model, also used for every evaluator call
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Configuration for Groq provider
#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl GroqConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: std::env::var("PARLEY_GROQ_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            api_key: api_key.into(),
            model: std::env::var("PARLEY_GROQ_MODEL")
                .unwrap_or_else(|_| DEFAULT_GROQ_MODEL.to_string()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Groq API provider
pub struct GroqProvider {
    config: GroqConfig,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(config: GroqConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl LLMProvider for GroqProvider {
    fn name(&self) -> &'static str {
        "Groq"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Groq
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let messages: Vec<ChatMessage> = request
            .messages
            .iter()
            .map(|msg| ChatMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content.clone()),
            })
            .collect();

        let model = request.model.unwrap_or_else(|| self.config.model.clone());
        let chat_request = ChatRequest {
            model: model.clone(),
            messages,
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            top_p: request.top_p,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| LLMError::InvalidResponse {
                message: e.to_string(),
            })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let usage = chat_response.usage.unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
            model: Some(model),
        })
    }
}

// ============================================================================
// Gemini Provider (Generative Language API, Gemma models)
// ============================================================================

/// Default Gemini-family model
pub const DEFAULT_GEMINI_MODEL: &str = "gemma-3-27b-it";

/// Configuration for Gemini provider
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: std::env::var("PARLEY_GEMINI_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            api_key: api_key.into(),
            model: std::env::var("PARLEY_GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Google Gemini API provider
///
/// Gemma models reject system instructions, so system content is sent as a
/// leading user turn.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

fn gemini_content(role: &str, text: impl Into<String>) -> GeminiContent {
    GeminiContent {
        role: role.to_string(),
        parts: vec![GeminiPart { text: text.into() }],
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let contents: Vec<GeminiContent> = request
            .messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    MessageRole::System | MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                };
                gemini_content(role, msg.content.clone())
            })
            .collect();

        let model = request.model.unwrap_or_else(|| self.config.model.clone());
        let generate_request = GenerateRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                top_p: request.top_p,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&generate_request)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let generate_response: GenerateResponse =
            response.json().await.map_err(|e| LLMError::InvalidResponse {
                message: e.to_string(),
            })?;

        let content = generate_response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        let usage = generate_response.usage_metadata.unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            },
            model: Some(model),
        })
    }
}

// ============================================================================
// Scripted Provider (dry runs and tests)
// ============================================================================

type Responder = dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync;

enum Script {
    Queue(VecDeque<String>),
    Function(Arc<Responder>),
}

/// Provider that answers from a script instead of a model
///
/// A queued script pops one response per call and keeps repeating the last
/// one once the queue runs dry. Every request is recorded.
pub struct ScriptedProvider {
    script: Mutex<Script>,
    last: Mutex<Option<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(Script::Queue(
                responses.into_iter().map(Into::into).collect(),
            )),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request by calling `f`
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            script: Mutex::new(Script::Function(Arc::new(f))),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_response(&self, request: &CompletionRequest) -> Result<String> {
        let mut script = self.script.lock().map_err(|_| LLMError::ProviderNotAvailable {
            provider: "scripted".to_string(),
        })?;
        match &mut *script {
            Script::Function(f) => (**f)(request),
            Script::Queue(queue) => {
                let mut last = self.last.lock().map_err(|_| LLMError::ProviderNotAvailable {
                    provider: "scripted".to_string(),
                })?;
                if let Some(next) = queue.pop_front() {
                    *last = Some(next);
                }
                last.clone().ok_or_else(|| LLMError::InvalidResponse {
                    message: "script is empty".to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Scripted
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let content = self.next_response(&request)?;
        Ok(CompletionResponse {
            content,
            usage: TokenUsage::default(),
            model: Some("scripted".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_queue_repeats_last() {
        let provider = ScriptedProvider::new(["first", "second"]);
        let request = CompletionRequest::new(vec![Message::user("hi")]);

        assert_eq!(provider.complete(request.clone()).await.unwrap().content, "first");
        assert_eq!(provider.complete(request.clone()).await.unwrap().content, "second");
        assert_eq!(provider.complete(request).await.unwrap().content, "second");
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_empty_queue_fails() {
        let provider = ScriptedProvider::new(Vec::<String>::new());
        let request = CompletionRequest::new(vec![Message::user("hi")]);
        assert!(provider.complete(request).await.is_err());
    }

    #[tokio::test]
    async fn test_scripted_function_sees_request() {
        let provider = ScriptedProvider::from_fn(|request| {
            Ok(format!("{} messages", request.messages.len()))
        });
        let request = CompletionRequest::new(vec![Message::user("a"), Message::assistant("b")]);
        assert_eq!(provider.complete(request).await.unwrap().content, "2 messages");
    }

    #[test]
    fn test_config_model_override() {
        let gemini = GeminiConfig::new("key").with_model("gemma-3-4b-it");
        assert_eq!(gemini.model, "gemma-3-4b-it");
        assert_eq!(gemini.api_key, "key");

        let groq = GroqProvider::new(GroqConfig::new("gsk"));
        assert_eq!(groq.name(), "Groq");
        assert_eq!(groq.kind(), ProviderKind::Groq);
    }
}
