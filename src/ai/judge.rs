use super::*;
use crate::types::{GuessImage, Ranking};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use serde::Deserialize;

/// Everything the judge needs to score one round.
#[derive(Debug, Clone)]
pub struct JudgeScene {
    pub gm_prompt: String,
    pub gm_image_url: String,
    pub guesses: Vec<GuessImage>,
}

/// Trait for ranking guess images against the GM's scene
#[async_trait]
pub trait Judge: Send + Sync {
    /// Score each guess 0-100 against the GM's prompt and image.
    /// The returned list need not be sorted; the store orders it.
    async fn rank(&self, scene: &JudgeScene) -> AiResult<Vec<Ranking>>;

    /// Get the name of this judge
    fn name(&self) -> &str;
}

/// Defined ranking used when judging fails every attempt: all guesses
/// score 0.0 in submission order, so the earliest submitter wins the
/// tie and the round always reaches `results`.
pub fn fallback_rankings(guesses: &[GuessImage]) -> Vec<Ranking> {
    guesses
        .iter()
        .map(|g| Ranking {
            player_id: g.player_id.clone(),
            similarity: 0.0,
        })
        .collect()
}

const JUDGE_SYSTEM_PROMPT: &str = "You judge an image guessing party game. \
    The first image is the Game Master's scene; every following image was generated from a \
    player's guess at the secret prompt. Score how similar each player's image is to the \
    Game Master's scene from 0 to 100. \
    Reply with ONLY a JSON array like [{\"player_id\":\"...\",\"similarity\":42}], no other text.";

/// OpenAI vision judge
pub struct OpenAiJudge {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: std::time::Duration,
}

impl OpenAiJudge {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model,
            timeout: std::time::Duration::from_secs(30),
        }
    }
}

fn image_part(url: &str) -> ChatCompletionRequestUserMessageContentPart {
    ChatCompletionRequestUserMessageContentPart::ImageUrl(
        ChatCompletionRequestMessageContentPartImage {
            image_url: ImageUrl {
                url: url.to_string(),
                detail: Some(ImageDetail::Low),
            },
        },
    )
}

fn text_part(text: String) -> ChatCompletionRequestUserMessageContentPart {
    ChatCompletionRequestUserMessageContentPart::Text(ChatCompletionRequestMessageContentPartText {
        text,
    })
}

#[derive(Debug, Deserialize)]
struct RawScore {
    player_id: String,
    similarity: f32,
}

/// Parse the judge's reply into one ranking per guess. Unknown player
/// ids are dropped, missing ones score 0.0, scores clamp to [0, 100].
fn parse_scores(reply: &str, guesses: &[GuessImage]) -> AiResult<Vec<Ranking>> {
    let trimmed = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let raw: Vec<RawScore> =
        serde_json::from_str(trimmed).map_err(|e| AiError::ParseError(e.to_string()))?;

    let rankings = guesses
        .iter()
        .map(|g| {
            let similarity = raw
                .iter()
                .find(|s| s.player_id == g.player_id)
                .map(|s| s.similarity.clamp(0.0, 100.0))
                .unwrap_or(0.0);
            Ranking {
                player_id: g.player_id.clone(),
                similarity,
            }
        })
        .collect();

    Ok(rankings)
}

#[async_trait]
impl Judge for OpenAiJudge {
    async fn rank(&self, scene: &JudgeScene) -> AiResult<Vec<Ranking>> {
        if scene.guesses.is_empty() {
            return Ok(Vec::new());
        }

        let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();
        content_parts.push(text_part(format!(
            "Game Master's secret prompt: {}\nGame Master's image follows, then one image per player.",
            scene.gm_prompt
        )));
        content_parts.push(image_part(&scene.gm_image_url));

        for guess in &scene.guesses {
            content_parts.push(text_part(format!(
                "player_id: {} (guess: {})",
                guess.player_id, guess.guess_text
            )));
            content_parts.push(image_part(&guess.image_url));
        }

        let user_message = ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Array(content_parts),
            name: None,
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(JUDGE_SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| AiError::ApiError(e.to_string()))?
                    .into(),
                user_message.into(),
            ])
            .build()
            .map_err(|e| AiError::ApiError(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| AiError::Timeout(self.timeout))?
            .map_err(|e| AiError::ApiError(e.to_string()))?;

        let reply = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AiError::ParseError("No content in response".to_string()))?;

        parse_scores(&reply, &scene.guesses)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
