/// Google generative-language backend
///
/// Calls `generateContent` on the configured model and parses the JSON body
/// the prompt demands. The response MIME type is pinned to JSON so the model
/// does not wrap its answer in prose.
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{MediaType, Suggestions},
    services::providers::{build_prompt, parse_suggestions, RecommendationProvider},
};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    model: String,
    search_count: usize,
    api_url: String,
}

impl GeminiProvider {
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
impl RecommendationProvider for GeminiProvider {
    async fn recommend(
        &self,
        seed_titles: &[String],
        media_type: MediaType,
    ) -> AppResult<Suggestions> {
        let prompt = build_prompt(seed_titles, media_type, self.search_count);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_url, self.model, self.api_key
        );

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": { "responseMimeType": "application/json" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Gemini API returned status {}: {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct GenerateResponse {
            #[serde(default)]
            candidates: Vec<ResponseCandidate>,
        }
        #[derive(Deserialize)]
        struct ResponseCandidate {
            content: Content,
        }
        #[derive(Deserialize)]
        struct Content {
            #[serde(default)]
            parts: Vec<Part>,
        }
        #[derive(Deserialize)]
        struct Part {
            text: String,
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| AppError::ExternalApi("Empty Gemini response".to_string()))?;

        let suggestions = parse_suggestions(text, self.search_count)?;

        tracing::info!(
            seeds = seed_titles.len(),
            results = suggestions.candidates.len(),
            lang = %suggestions.language,
            provider = "gemini",
            "Recommendations generated"
        );

        Ok(suggestions)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
