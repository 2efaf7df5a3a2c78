//! LLM Router - Selects providers and retries failed generations

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;

use crate::format::PromptFormat;
use crate::providers::*;
use crate::types::*;

/// Bounded exponential backoff around every generation call
///
/// The delay after failed attempt `n` is `2^(n-1)` seconds clamped to
/// `[min_delay, max_delay]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let secs = 2u64.saturating_pow(attempt.saturating_sub(1).min(63));
        Duration::from_secs(secs).clamp(self.min_delay, self.max_delay)
    }

    pub fn should_retry(&self, attempt: u32, error: &LLMError) -> bool {
        !matches!(error, LLMError::ConfigurationError { .. }) && attempt < self.max_attempts
    }
}

/// API keys as stored in an `API_KEY.json` file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeys {
    #[serde(rename = "GROQ_KEY", default)]
    pub groq: Option<String>,
    #[serde(rename = "GENAI_KEY", default)]
    pub gemini: Option<String>,
}

impl ApiKeys {
    /// Read keys from the environment (`GROQ_API_KEY`, `GEMINI_API_KEY`)
    pub fn from_env() -> Self {
        Self {
            groq: std::env::var("GROQ_API_KEY").ok(),
            gemini: std::env::var("GEMINI_API_KEY").ok(),
        }
    }

    /// Read keys from a JSON file; keys missing there fall back to the environment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| LLMError::ConfigurationError {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let keys: Self = serde_json::from_str(&raw).map_err(|e| LLMError::ConfigurationError {
            message: format!("invalid key file {}: {}", path.display(), e),
        })?;
        let env = Self::from_env();
        Ok(Self {
            groq: keys.groq.or(env.groq),
            gemini: keys.gemini.or(env.gemini),
        })
    }

    fn require(key: &Option<String>, name: &str) -> Result<String> {
        key.clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LLMError::ConfigurationError {
                message: format!("{} API key not found", name),
            })
    }
}

/// The LLM Router owns one provider and the retry policy around it
pub struct LLMRouter {
    provider: Arc<dyn LLMProvider>,
    kind: ProviderKind,
    retry: RetryPolicy,
    model: Option<String>,
}

impl LLMRouter {
    /// Create a router with a specific provider
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let kind = provider.kind();
        Self {
            provider,
            kind,
            retry: RetryPolicy::default(),
            model: None,
        }
    }

    /// Create a router for a provider kind with explicit keys and model
    pub fn with_keys(kind: ProviderKind, keys: &ApiKeys, model: Option<&str>) -> Result<Self> {
        let provider: Arc<dyn LLMProvider> = match kind {
            ProviderKind::Groq => {
                let mut config = GroqConfig::new(ApiKeys::require(&keys.groq, "Groq")?);
                if let Some(model) = model {
                    config = config.with_model(model);
                }
                Arc::new(GroqProvider::new(config))
            }
            ProviderKind::Gemini => {
                let mut config = GeminiConfig::new(ApiKeys::require(&keys.gemini, "Gemini")?);
                if let Some(model) = model {
                    config = config.with_model(model);
                }
                Arc::new(GeminiProvider::new(config))
            }
            ProviderKind::Scripted => {
                return Err(LLMError::ConfigurationError {
                    message: "scripted provider needs a script".to_string(),
                })
            }
        };

        Ok(Self::new(provider))
    }

    /// Router used for structured analysis and evaluation calls
    ///
    /// Always Groq, pinned to the default Llama model regardless of any
    /// model override in the environment.
    pub fn evaluator(keys: &ApiKeys) -> Result<Self> {
        Ok(Self::with_keys(ProviderKind::Groq, keys, Some(DEFAULT_GROQ_MODEL))?
            .with_model(DEFAULT_GROQ_MODEL))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Pin the model used for requests that do not name one
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Get the provider kind
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Prompt format native to the provider
    pub fn prompt_format(&self) -> PromptFormat {
        PromptFormat::for_provider(self.kind)
    }

    /// Complete a request, retrying with backoff
    pub async fn complete(&self, mut request: CompletionRequest) -> Result<CompletionResponse> {
        if request.model.is_none() {
            request.model = self.model.clone();
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.provider.complete(request.clone()).await {
                Ok(response) => {
                    tracing::debug!(
                        provider = self.provider.name(),
                        attempt,
                        total_tokens = response.usage.total_tokens,
                        "Generation complete"
                    );
                    return Ok(response);
                }
                Err(e) if self.retry.should_retry(attempt, &e) => {
                    let delay = match &e {
                        LLMError::RateLimited {
                            retry_after_seconds,
                        } if *retry_after_seconds > 0 => Duration::from_secs(*retry_after_seconds)
                            .min(self.retry.max_delay),
                        _ => self.retry.delay_for_attempt(attempt),
                    };
                    tracing::warn!(
                        provider = self.provider.name(),
                        attempt,
                        delay_secs = delay.as_secs(),
                        "Generation failed: {}, retrying",
                        e
                    );
                    sleep(delay).await;
                }
                Err(e) if attempt > 1 => {
                    return Err(LLMError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Complete a request and return only the generated text
    pub async fn generate(&self, request: CompletionRequest) -> Result<String> {
        Ok(self.complete(request).await?.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scripted(provider: ScriptedProvider, retry: RetryPolicy) -> LLMRouter {
        LLMRouter::new(Arc::new(provider)).with_retry(retry)
    }

    #[test]
    fn test_default_retry_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(16));
        assert_eq!(policy.delay_for_attempt(6), Duration::from_secs(32));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_secs(120)); // capped
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_generate_returns_text() {
        let router = scripted(ScriptedProvider::new(["hello"]), RetryPolicy::none());
        assert_eq!(router.kind(), ProviderKind::Scripted);
        assert_eq!(router.prompt_format(), PromptFormat::Llama);

        let text = router
            .generate(CompletionRequest::deterministic(vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let provider = ScriptedProvider::from_fn(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LLMError::NetworkError {
                    message: "connection reset".to_string(),
                })
            } else {
                Ok("ok".to_string())
            }
        });
        let policy = RetryPolicy {
            max_attempts: 3,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let router = scripted(provider, policy);

        let text = router
            .generate(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(text, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let provider = ScriptedProvider::from_fn(|_| {
            Err(LLMError::RequestFailed {
                message: "HTTP 500".to_string(),
            })
        });
        let policy = RetryPolicy {
            max_attempts: 2,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let router = scripted(provider, policy);

        let err = router
            .generate(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::RetriesExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_pinned_model_is_applied() {
        let provider = Arc::new(ScriptedProvider::from_fn(|request| {
            Ok(request.model.clone().unwrap_or_default())
        }));
        let router = LLMRouter::new(provider)
            .with_retry(RetryPolicy::none())
            .with_model(DEFAULT_GROQ_MODEL);

        let text = router
            .generate(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(text, DEFAULT_GROQ_MODEL);
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let keys = ApiKeys::default();
        assert!(matches!(
            LLMRouter::with_keys(ProviderKind::Gemini, &keys, None),
            Err(LLMError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_api_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("API_KEY.json");
        std::fs::write(&path, r#"{"GROQ_KEY": "gsk-test", "GENAI_KEY": "genai-test"}"#).unwrap();

        let keys = ApiKeys::from_file(&path).unwrap();
        assert_eq!(keys.groq.as_deref(), Some("gsk-test"));
        assert_eq!(keys.gemini.as_deref(), Some("genai-test"));

        let router = LLMRouter::evaluator(&keys).unwrap();
        assert_eq!(router.kind(), ProviderKind::Groq);
    }
}
