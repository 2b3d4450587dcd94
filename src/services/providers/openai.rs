/// OpenAI-style chat-completions backend
///
/// Also covers compatible vendors that speak the same wire format; only the
/// base URL and model identifier differ.
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{MediaType, Suggestions},
    services::providers::{build_prompt, parse_suggestions, RecommendationProvider},
};

const DEFAULT_API_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    model: String,
    search_count: usize,
    api_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, search_count: usize) -> Self {
        Self::with_base_url(api_key, model, search_count, DEFAULT_API_URL.to_string())
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        search_count: usize,
        api_url: String,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            model,
            search_count,
            api_url,
        }
    }
}

#[async_trait::async_trait]
impl RecommendationProvider for OpenAiProvider {
    async fn recommend(
        &self,
        seed_titles: &[String],
        media_type: MediaType,
    ) -> AppResult<Suggestions> {
        let prompt = build_prompt(seed_titles, media_type, self.search_count);
        let url = format!("{}/v1/chat/completions", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "response_format": { "type": "json_object" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "OpenAI API returned status {}: {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            #[serde(default)]
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: String,
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| AppError::ExternalApi("Empty OpenAI response".to_string()))?;

        let suggestions = parse_suggestions(text, self.search_count)?;

        tracing::info!(
            seeds = seed_titles.len(),
            results = suggestions.candidates.len(),
            lang = %suggestions.language,
            provider = "openai",
            "Recommendations generated"
        );

        Ok(suggestions)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
