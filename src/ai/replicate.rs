use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://api.replicate.com/v1";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLLS: u32 = 30;

/// Replicate provider implementation: create a prediction, then poll
/// until it settles.
pub struct ReplicateProvider {
    api_token: String,
    version: String,
    client: reqwest::Client,
}

impl ReplicateProvider {
    /// Create a new Replicate provider with the given API token and
    /// model version hash
    pub fn new(api_token: String, version: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");

        Self {
            api_token,
            version,
            client,
        }
    }

    async fn create_prediction(&self, prompt: &str) -> AiResult<PredictionResponse> {
        let request = PredictionRequest {
            version: self.version.clone(),
            input: PredictionInput {
                prompt: prompt.to_string(),
                width: 512,
                height: 512,
                num_outputs: 1,
            },
        };

        let response = self
            .client
            .post(format!("{}/predictions", API_BASE))
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AiError::ApiError(format!(
                "Replicate API returned status: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AiError::ParseError(e.to_string()))
    }

    async fn poll_prediction(&self, id: &str) -> AiResult<PredictionResponse> {
        let response = self
            .client
            .get(format!("{}/predictions/{}", API_BASE, id))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| AiError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AiError::ApiError(format!(
                "Replicate poll returned status: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AiError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest {
    version: String,
    input: PredictionInput,
}

#[derive(Debug, Serialize)]
struct PredictionInput {
    prompt: String,
    width: u32,
    height: u32,
    num_outputs: u32,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

impl PredictionResponse {
    fn first_output(&self) -> Option<String> {
        self.output
            .as_ref()
            .and_then(|urls| urls.first())
            .cloned()
            .filter(|url| !url.is_empty())
    }
}

#[async_trait]
impl ImageProvider for ReplicateProvider {
    async fn generate(&self, prompt: &str) -> AiResult<String> {
        let mut prediction = self.create_prediction(prompt).await?;
        let id = prediction.id.clone();

        for _ in 0..MAX_POLLS {
            match prediction.status.as_str() {
                "succeeded" => {
                    return prediction
                        .first_output()
                        .ok_or_else(|| AiError::ParseError("empty output list".to_string()));
                }
                "failed" | "canceled" => {
                    return Err(AiError::ApiError(
                        prediction
                            .error
                            .unwrap_or_else(|| format!("prediction {}", prediction.status)),
                    ));
                }
                _ => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                    prediction = self.poll_prediction(&id).await?;
                }
            }
        }

        Err(AiError::Timeout(POLL_INTERVAL * MAX_POLLS))
    }

    fn name(&self) -> &str {
        "replicate"
    }
}
