use super::*;

/// Pollinations provider: the image is rendered by the vendor when the
/// URL is first fetched, so "generation" is just composing the URL.
/// Kept last in the provider chain as the free fallback.
pub struct PollinationsProvider {
    base_url: String,
}

impl PollinationsProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageProvider for PollinationsProvider {
    async fn generate(&self, prompt: &str) -> AiResult<String> {
        if prompt.trim().is_empty() {
            return Err(AiError::ApiError("empty prompt".to_string()));
        }

        Ok(format!(
            "{}/prompt/{}?width=512&height=512&nologo=true",
            self.base_url,
            url_encode(prompt.trim())
        ))
    }

    fn name(&self) -> &str {
        "pollinations"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_url_composition() {
        let provider = PollinationsProvider::new("https://image.pollinations.ai/".to_string());
        let url = provider.generate("a red fox in snow").await.unwrap();
        assert_eq!(
            url,
            "https://image.pollinations.ai/prompt/a%20red%20fox%20in%20snow?width=512&height=512&nologo=true"
        );
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let provider = PollinationsProvider::new("https://image.pollinations.ai".to_string());
        assert!(provider.generate("  ").await.is_err());
    }
}
