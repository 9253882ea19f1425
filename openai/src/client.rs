use crate::{
    DEFAULT_BASE_URL, DEFAULT_EMBEDDING_DIM, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL,
    EMBEDDING_LARGE, EMBEDDING_SMALL, error::OpenAIError,
};
use reqwest::{RequestBuilder, Response, header};
use std::{sync::Arc, time::Duration};

/// Configuration for request retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt number (0-indexed).
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

/// Get retry delay for an error, respecting Retry-After header for rate limits.
fn retry_delay(err: &OpenAIError, attempt: u32, config: &RetryConfig) -> Duration {
    if let OpenAIError::RateLimit {
        retry_after: Some(delay),
        ..
    } = err
    {
        // Respect Retry-After header, but cap at max_delay
        return (*delay).min(config.max_delay);
    }
    config.delay_for_attempt(attempt)
}

/// Turns an unsuccessful response into the matching error.
async fn check_status(response: Response) -> Result<Response, OpenAIError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    let message = api_error_message(&body).unwrap_or(body);

    Err(match status.as_u16() {
        429 => OpenAIError::RateLimit {
            message,
            retry_after,
        },
        code @ 500..=599 => OpenAIError::ServerError {
            status: code,
            message,
        },
        code => OpenAIError::Status {
            status: code,
            message,
        },
    })
}

/// Extracts `error.message` from an API error body.
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    Some(
        error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown API error")
            .to_string(),
    )
}

/// Sends the request built by `make_request`, retrying transport failures,
/// 429 and 5xx responses with exponential backoff.
pub(crate) async fn send_with_retry<F>(cfg: &Config, make_request: F) -> Result<Response, OpenAIError>
where
    F: Fn() -> RequestBuilder,
{
    let retry_config = &cfg.retry;
    let mut attempt = 0;

    loop {
        let result = match make_request().send().await {
            Ok(response) => check_status(response).await,
            Err(err) => Err(OpenAIError::from(err)),
        };

        match result {
            Ok(response) => return Ok(response),
            Err(err) if attempt < retry_config.max_retries && err.is_retryable() => {
                let delay = retry_delay(&err, attempt, retry_config);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = retry_config.max_retries,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Request failed, retrying"
                );
                async_io::Timer::after(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Client for an OpenAI-compatible API, implementing both
/// [`EmbeddingModel`](qadex_core::EmbeddingModel) and
/// [`LanguageModel`](qadex_core::LanguageModel).
#[derive(Clone, Debug)]
pub struct OpenAI {
    inner: Arc<Config>,
}

impl OpenAI {
    /// Create a new client using the provided API key and default models.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).build()
    }

    /// Start building an [`OpenAI`] client with custom configuration.
    #[must_use]
    pub fn builder(api_key: impl Into<String>) -> Builder {
        Builder::new(api_key)
    }

    /// Override the default chat model in-place.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).chat_model = sanitize_model(model);
        self
    }

    /// Override the REST base URL (useful for OpenAI-compatible endpoints).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).base_url = base_url.into();
        self
    }

    /// Override the embeddings model identifier.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        let model = sanitize_model(model);
        let cfg = Arc::make_mut(&mut self.inner);
        if let Some(dim) = infer_embedding_dim(&model) {
            cfg.embedding_dimensions = dim;
        }
        cfg.embedding_model = model;
        self
    }

    /// Returns the chat model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.chat_model
    }

    /// Returns the embeddings model identifier.
    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.inner.embedding_model
    }

    pub(crate) fn config(&self) -> Arc<Config> {
        self.inner.clone()
    }
}

/// Builder for [`OpenAI`] clients.
#[derive(Debug)]
pub struct Builder {
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    embedding_dimensions: usize,
    requested_dimensions: Option<usize>,
    organization: Option<String>,
    retry: RetryConfig,
    request_timeout: Duration,
}

/// Default request timeout (5 minutes - generous for long completions).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

impl Builder {
    fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIM,
            requested_dimensions: None,
            organization: None,
            retry: RetryConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set a custom API base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Select a chat model identifier (e.g., `gpt-4o-mini`).
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = sanitize_model(model);
        self
    }

    /// Select the embeddings model identifier.
    ///
    /// The vector dimension is inferred for the well-known `OpenAI` models.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        let model = sanitize_model(model);
        if let Some(dim) = infer_embedding_dim(&model) {
            self.embedding_dimensions = dim;
        }
        self.embedding_model = model;
        self
    }

    /// Request vectors of `dimensions` components.
    ///
    /// The value is sent as the `dimensions` parameter, which the `text-embedding-3`
    /// models honour by shortening their output.
    #[must_use]
    pub const fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.embedding_dimensions = dimensions;
        self.requested_dimensions = Some(dimensions);
        self
    }

    /// Attach an `OpenAI` organization header.
    #[must_use]
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Configure retry behavior for failed requests.
    ///
    /// By default, requests are retried up to 3 times with exponential backoff.
    /// Retries happen on network errors, timeouts and HTTP status codes 429 and 5xx.
    #[must_use]
    pub const fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Set maximum number of retry attempts.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Disable retries entirely.
    #[must_use]
    pub fn no_retry(mut self) -> Self {
        self.retry = RetryConfig::none();
        self
    }

    /// Set the request timeout.
    ///
    /// Default is 5 minutes, which is generous for long completions.
    /// The timeout applies to the entire request, including response streaming.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Consume the builder and create an [`OpenAI`] client.
    #[must_use]
    pub fn build(self) -> OpenAI {
        OpenAI {
            inner: Arc::new(Config {
                http: reqwest::Client::new(),
                api_key: self.api_key,
                base_url: self.base_url,
                chat_model: self.chat_model,
                embedding_model: self.embedding_model,
                embedding_dimensions: self.embedding_dimensions,
                requested_dimensions: self.requested_dimensions,
                organization: self.organization,
                retry: self.retry,
                request_timeout: self.request_timeout,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) http: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) chat_model: String,
    pub(crate) embedding_model: String,
    pub(crate) embedding_dimensions: usize,
    pub(crate) requested_dimensions: Option<usize>,
    pub(crate) organization: Option<String>,
    pub(crate) retry: RetryConfig,
    pub(crate) request_timeout: Duration,
}

impl Config {
    pub(crate) fn request_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// POST to `path` with authentication and the shared headers applied.
    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .post(self.request_url(path))
            .bearer_auth(&self.api_key)
            .header(header::USER_AGENT, "qadex-openai/0.1")
            .timeout(self.request_timeout);
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        builder
    }
}

fn sanitize_model(model: impl Into<String>) -> String {
    model.into().trim().to_string()
}

pub(crate) fn infer_embedding_dim(model: &str) -> Option<usize> {
    match model {
        EMBEDDING_LARGE => Some(3072),
        EMBEDDING_SMALL => Some(1536),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OPENAI_BASE_URL;

    #[test]
    fn builder_defaults() {
        let client = OpenAI::new("sk-test");
        let cfg = client.config();
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.embedding_model(), "text-embedding-3-small");
        assert_eq!(cfg.embedding_dimensions, 1536);
        assert_eq!(cfg.requested_dimensions, None);
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn embedding_dimension_follows_model() {
        let client = OpenAI::builder("sk-test")
            .embedding_model(" text-embedding-3-large ")
            .build();
        assert_eq!(client.embedding_model(), "text-embedding-3-large");
        assert_eq!(client.config().embedding_dimensions, 3072);

        let shortened = OpenAI::builder("sk-test")
            .embedding_model("text-embedding-3-large")
            .embedding_dimensions(256)
            .build();
        assert_eq!(shortened.config().embedding_dimensions, 256);
        assert_eq!(shortened.config().requested_dimensions, Some(256));

        let custom = OpenAI::new("sk-test").with_embedding_model("nomic-embed-text");
        assert_eq!(custom.config().embedding_dimensions, 1536);
    }

    #[test]
    fn only_known_embedding_models_have_dimensions() {
        assert_eq!(infer_embedding_dim(EMBEDDING_SMALL), Some(1536));
        assert_eq!(infer_embedding_dim(EMBEDDING_LARGE), Some(3072));
        assert_eq!(infer_embedding_dim("text-embedding-ada-002"), None);
        assert_eq!(OpenAI::new("sk-test").config().base_url, OPENAI_BASE_URL);
    }

    #[test]
    fn request_url_joins_cleanly() {
        let client = OpenAI::builder("sk-test")
            .base_url("http://localhost:8080/v1/")
            .build();
        assert_eq!(
            client.config().request_url("/embeddings"),
            "http://localhost:8080/v1/embeddings"
        );
        assert_eq!(
            OpenAI::new("k").config().request_url("chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(20), Duration::from_secs(30));
        assert_eq!(RetryConfig::none().max_retries, 0);
    }

    #[test]
    fn retry_after_is_honoured() {
        let config = RetryConfig::default();
        let limited = OpenAIError::RateLimit {
            message: String::new(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(retry_delay(&limited, 0, &config), Duration::from_secs(7));

        let greedy = OpenAIError::RateLimit {
            message: String::new(),
            retry_after: Some(Duration::from_secs(600)),
        };
        assert_eq!(retry_delay(&greedy, 0, &config), Duration::from_secs(30));
        assert_eq!(
            retry_delay(&OpenAIError::Timeout, 1, &config),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            api_error_message(r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error"}}"#),
            Some("Incorrect API key".to_string())
        );
        assert_eq!(api_error_message("<html>bad gateway</html>"), None);
    }
}
