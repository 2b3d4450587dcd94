use std::sync::Arc;

/// Recommendation provider abstraction
///
/// This module provides a pluggable architecture for the LLM backends that
/// propose candidate titles (Google-style, OpenAI-style). Backends share the
/// prompt and response-parsing conventions; selection is an explicit
/// capability check over which key a user supplied.
use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{credentials::resolve_key, Candidate, CredentialBundle, MediaType, Suggestions},
};
use serde::Deserialize;

pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Trait for LLM recommendation backends
///
/// Given seed titles (a search query, or a user's recent watches), a backend
/// proposes a bounded list of candidates plus the language it answered in.
/// The language steers metadata search locale downstream.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationProvider: Send + Sync {
    async fn recommend(
        &self,
        seed_titles: &[String],
        media_type: MediaType,
    ) -> AppResult<Suggestions>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Picks a backend from the keys present in a credential bundle
#[cfg_attr(test, mockall::automock)]
pub trait SelectProvider: Send + Sync {
    fn select(&self, bundle: &CredentialBundle) -> AppResult<Arc<dyn RecommendationProvider>>;
}

/// Capability-based selection: a Google-style key wins, then an OpenAI-style
/// key. The literal "default" opts into the operator's Google key. Neither
/// present is `NoProviderConfigured` — unauthenticated flows never fall back
/// to a guessed default backend.
pub struct KeyBasedSelector {
    config: Arc<Config>,
}

impl KeyBasedSelector {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl SelectProvider for KeyBasedSelector {
    fn select(&self, bundle: &CredentialBundle) -> AppResult<Arc<dyn RecommendationProvider>> {
        if let Some(google_key) =
            resolve_key(bundle.google_key.as_deref(), &self.config.gemini_api_key)
        {
            return Ok(Arc::new(GeminiProvider::new(
                google_key,
                self.config.google_model.clone(),
                self.config.search_count,
            )));
        }

        if let Some(openai_key) = bundle.open_ai_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(Arc::new(OpenAiProvider::new(
                openai_key.to_string(),
                self.config.openai_model.clone(),
                self.config.search_count,
            )));
        }

        Err(AppError::NoProviderConfigured)
    }
}

/// Prompt shared by every backend
pub(crate) fn build_prompt(seed_titles: &[String], media_type: MediaType, count: usize) -> String {
    let kind = match media_type {
        MediaType::Movie => "movies",
        MediaType::Series => "TV series",
    };

    format!(
        "You recommend {kind}. The user liked: {seeds}. \
         Suggest {count} other {kind} they have not listed, ordered by fit. \
         Answer in the same language as the input titles. \
         Respond with JSON only, no prose, in the shape \
         {{\"recommendations\":[{{\"title\":\"...\",\"year\":2010,\"reason\":\"one short sentence\"}}],\"lang\":\"en\"}} \
         where lang is the two-letter code of the language you answered in.",
        kind = kind,
        seeds = seed_titles.join(", "),
        count = count,
    )
}

/// Parses a backend's text completion into candidates, tolerating markdown
/// code fences, and bounds the list to the configured count.
pub(crate) fn parse_suggestions(raw: &str, max_candidates: usize) -> AppResult<Suggestions> {
    #[derive(Deserialize)]
    struct Wire {
        #[serde(default)]
        recommendations: Vec<Candidate>,
        #[serde(default = "default_lang")]
        lang: String,
    }

    fn default_lang() -> String {
        "en".to_string()
    }

    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let wire: Wire = serde_json::from_str(cleaned)
        .map_err(|e| AppError::ExternalApi(format!("Unparseable model response: {}", e)))?;

    let mut candidates = wire.recommendations;
    candidates.truncate(max_candidates);

    Ok(Suggestions {
        candidates,
        language: wire.lang,
    })
}
