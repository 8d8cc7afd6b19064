use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs},
    Client,
};
use rand::Rng;

/// System prompt for generating the GM's secret scene
const SCENE_SYSTEM_PROMPT: &str = "You invent scenes for an image guessing party game. \
    Answer with exactly one vivid, concrete scene description of at most 15 words. \
    It must be paintable as a single image. No preamble, no quotes, no explanations.";

/// Built-in scenes used when no text model is configured or the call
/// fails. Varied enough that consecutive fallback rounds differ.
const SCENE_FALLBACKS: &[&str] = &[
    "A lighthouse keeper sharing breakfast with a giant octopus",
    "A futuristic city floating above the clouds at sunset",
    "A library where the books fly between shelves like birds",
    "An astronaut planting sunflowers on a tiny red asteroid",
    "A steam train crossing a bridge made of rainbow glass",
    "A fox in a detective coat examining footprints in snow",
    "A desert caravan of turtles carrying lanterns at dusk",
    "An underwater tea party inside a sunken grand piano",
];

/// Pick a fallback scene with the caller's randomness source, so tests
/// can seed it deterministically.
pub fn fallback_scene<R: Rng>(rng: &mut R) -> String {
    SCENE_FALLBACKS[rng.random_range(0..SCENE_FALLBACKS.len())].to_string()
}

/// Generates the GM's secret prompt via OpenAI chat. Failure is not an
/// error path for callers: they substitute [`fallback_scene`].
pub struct ScenePrompter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    timeout: std::time::Duration,
}

impl ScenePrompter {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Some(Client::with_config(config)),
            model,
            timeout: std::time::Duration::from_secs(10),
        }
    }

    /// A prompter with no backing model; `generate` always errors and
    /// callers fall back to the built-in scene list.
    pub fn disabled() -> Self {
        Self {
            client: None,
            model: String::new(),
            timeout: std::time::Duration::from_secs(10),
        }
    }

    pub async fn generate(&self) -> AiResult<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AiError::ConfigError("no text model configured".to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SCENE_SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| AiError::ApiError(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content("Give me one scene.")
                    .build()
                    .map_err(|e| AiError::ApiError(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| AiError::ApiError(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, client.chat().create(request))
            .await
            .map_err(|_| AiError::Timeout(self.timeout))?
            .map_err(|e| AiError::ApiError(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|t| t.trim().trim_matches('"').to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AiError::ParseError("No content in response".to_string()))?;

        Ok(text)
    }
}
