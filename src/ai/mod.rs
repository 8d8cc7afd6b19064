mod judge;
mod pollinations;
mod replicate;
mod scene;

use async_trait::async_trait;
use std::time::Duration;

pub use judge::{fallback_rankings, Judge, JudgeScene, OpenAiJudge};
pub use pollinations::PollinationsProvider;
pub use replicate::ReplicateProvider;
pub use scene::{fallback_scene, ScenePrompter};

/// Result type for AI collaborator operations
pub type AiResult<T> = Result<T, AiError>;

/// Errors that can occur while talking to external AI services
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Trait that all image generation providers implement
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate an image for the given prompt, returning its URL.
    async fn generate(&self, prompt: &str) -> AiResult<String>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Image generation front door: tries providers in priority order and
/// substitutes a placeholder when every provider fails.
///
/// `generate` is infallible by contract: phase progression must never
/// block on generation outcome, so failures resolve to the placeholder
/// path instead of an error.
pub struct ImageService {
    providers: Vec<Box<dyn ImageProvider>>,
    timeout: Duration,
}

impl ImageService {
    pub fn new(providers: Vec<Box<dyn ImageProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// A service with no providers; every request resolves to the
    /// placeholder. Used when no API keys are configured, and in tests.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Duration::from_secs(1))
    }

    pub async fn generate(&self, prompt: &str) -> String {
        for provider in &self.providers {
            match tokio::time::timeout(self.timeout, provider.generate(prompt)).await {
                Ok(Ok(url)) if !url.is_empty() => {
                    tracing::info!("Image generated via {}", provider.name());
                    return url;
                }
                Ok(Ok(_)) => {
                    tracing::warn!("Provider {} returned an empty URL", provider.name());
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {:?}",
                        provider.name(),
                        self.timeout
                    );
                }
            }
        }

        tracing::warn!("All image providers failed for: {}", prompt);
        placeholder_image(prompt)
    }
}

/// Configuration for AI collaborators
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Replicate API token
    pub replicate_api_token: Option<String>,
    /// Replicate model version hash
    pub replicate_version: String,
    /// Pollinations base URL
    pub pollinations_base_url: Option<String>,
    /// OpenAI API key (scene prompts and judging)
    pub openai_api_key: Option<String>,
    /// OpenAI model to use
    pub openai_model: String,
    /// Per-provider timeout for image generation
    pub image_timeout: Duration,
    /// How many times judging is attempted before the fallback ranking
    pub judge_attempts: u32,
}

const DEFAULT_REPLICATE_VERSION: &str =
    "39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b";

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            replicate_api_token: None,
            replicate_version: DEFAULT_REPLICATE_VERSION.to_string(),
            pollinations_base_url: Some("https://image.pollinations.ai".to_string()),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            image_timeout: Duration::from_secs(60),
            judge_attempts: 2,
        }
    }
}

impl AiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            replicate_api_token: non_empty_env("REPLICATE_API_TOKEN"),
            replicate_version: non_empty_env("REPLICATE_VERSION")
                .unwrap_or(defaults.replicate_version),
            pollinations_base_url: match std::env::var("POLLINATIONS_BASE_URL") {
                Ok(url) => {
                    let trimmed = url.trim();
                    (!trimmed.is_empty()).then(|| trimmed.to_string())
                }
                Err(_) => defaults.pollinations_base_url,
            },
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_model: non_empty_env("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            image_timeout: std::env::var("IMAGE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.image_timeout),
            judge_attempts: std::env::var("JUDGE_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.judge_attempts),
        }
    }

    /// Build the image service with all configured providers, highest
    /// quality first. An empty provider list is fine: the service then
    /// always answers with the placeholder.
    pub fn build_image_service(&self) -> ImageService {
        let mut providers: Vec<Box<dyn ImageProvider>> = Vec::new();

        if let Some(token) = &self.replicate_api_token {
            providers.push(Box::new(ReplicateProvider::new(
                token.clone(),
                self.replicate_version.clone(),
            )));
        }

        if let Some(base_url) = &self.pollinations_base_url {
            providers.push(Box::new(PollinationsProvider::new(base_url.clone())));
        }

        if providers.is_empty() {
            tracing::warn!(
                "No image providers configured; guess images will use placeholders. \
                 Set REPLICATE_API_TOKEN or POLLINATIONS_BASE_URL."
            );
        }

        ImageService::new(providers, self.image_timeout)
    }

    pub fn build_scene_prompter(&self) -> ScenePrompter {
        match &self.openai_api_key {
            Some(key) => ScenePrompter::new(key.clone(), self.openai_model.clone()),
            None => ScenePrompter::disabled(),
        }
    }

    pub fn build_judge(&self) -> Option<OpenAiJudge> {
        self.openai_api_key
            .as_ref()
            .map(|key| OpenAiJudge::new(key.clone(), self.openai_model.clone()))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Deterministic inline-SVG placeholder, substituted whenever external
/// generation fails so the game never stalls waiting on a vendor.
pub fn placeholder_image(prompt: &str) -> String {
    let short: String = prompt.chars().take(40).collect();
    format!(
        "data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' width='512' height='512'%3E\
         %3Crect fill='%23162029' width='512' height='512'/%3E\
         %3Ctext fill='%23E5B96F' font-family='serif' font-size='18' x='50%25' y='45%25' text-anchor='middle'%3EImage unavailable%3C/text%3E\
         %3Ctext fill='%23E5B96F' font-family='serif' font-size='14' x='50%25' y='55%25' text-anchor='middle'%3E{}%3C/text%3E\
         %3C/svg%3E",
        url_encode(&short)
    )
}

/// Percent-encode a string for use inside a URL (RFC 3986 unreserved
/// characters pass through).
pub(crate) fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
