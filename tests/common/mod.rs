#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cinesage::config::Config;
use cinesage::db::semantic::Embedder;
use cinesage::error::{AppError, AppResult};
use cinesage::models::{Candidate, CredentialBundle, MediaType, Meta, Suggestions};
use cinesage::services::metadata::{Resolution, TitleResolver};
use cinesage::services::posters::PosterOverride;
use cinesage::services::providers::{RecommendationProvider, SelectProvider};
use cinesage::services::watch_history::{TokenGrant, WatchHistory};
use cinesage::vault::{MemoryVaultStore, VaultStore};

pub fn test_config() -> Config {
    Config {
        redis_url: "redis://localhost:6379".to_string(),
        disable_cache: false,
        encryption_key: "00".repeat(32),
        gemini_api_key: "operator-gemini".to_string(),
        tmdb_api_key: "operator-tmdb".to_string(),
        tmdb_api_url: "https://api.themoviedb.org".to_string(),
        trakt_client_id: "cid".to_string(),
        trakt_client_secret: "secret".to_string(),
        trakt_api_url: "https://api.trakt.tv".to_string(),
        rpdb_api_url: "https://api.ratingposterdb.com".to_string(),
        google_model: "gemini-test".to_string(),
        openai_model: "gpt-test".to_string(),
        search_count: 20,
        semantic_proximity: 0.95,
        reset_vector_cron: "0 0 1 * *".to_string(),
        host: "127.0.0.1".to_string(),
        port: 3000,
    }
}

pub fn resolved_meta(id: &str, name: &str) -> Meta {
    Meta {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        media_type: MediaType::Movie,
        poster: Some(format!("https://image.tmdb.org/t/p/w500/{}.jpg", id)),
        poster_shape: "poster".to_string(),
        release_year: Some("2010".to_string()),
    }
}

pub fn candidates(titles: &[&str]) -> Suggestions {
    Suggestions {
        candidates: titles
            .iter()
            .map(|title| Candidate {
                title: title.to_string(),
                year: Some(2010),
                reason: "fits the theme".to_string(),
            })
            .collect(),
        language: "en".to_string(),
    }
}

/// Recommendation backend with a canned reply and a call counter
pub struct FakeProvider {
    pub suggestions: Suggestions,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(suggestions: Suggestions) -> Self {
        Self {
            suggestions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecommendationProvider for FakeProvider {
    async fn recommend(
        &self,
        _seed_titles: &[String],
        _media_type: MediaType,
    ) -> AppResult<Suggestions> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.suggestions.clone())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Selector that hands out one provider, gated on the bundle carrying an
/// LLM key — same contract as the production selector.
pub struct StaticSelector(pub Arc<dyn RecommendationProvider>);

impl SelectProvider for StaticSelector {
    fn select(&self, bundle: &CredentialBundle) -> AppResult<Arc<dyn RecommendationProvider>> {
        if bundle.has_llm_key() {
            Ok(self.0.clone())
        } else {
            Err(AppError::NoProviderConfigured)
        }
    }
}

/// Resolver that resolves every title, deriving a stable id from the name
pub struct FakeResolver;

#[async_trait]
impl TitleResolver for FakeResolver {
    async fn resolve(
        &self,
        title: &str,
        _language: &str,
        media_type: MediaType,
        _api_key: &str,
    ) -> Resolution {
        let slug = title.to_lowercase().replace(' ', "-");
        Resolution {
            meta: Meta {
                id: Some(format!("tt-{}", slug)),
                name: Some(title.to_string()),
                media_type,
                poster: Some(format!("https://image.tmdb.org/t/p/w500/{}.jpg", slug)),
                poster_shape: "poster".to_string(),
                release_year: Some("2010".to_string()),
            },
            from_cache: false,
            cache_written: true,
        }
    }
}

pub struct NoopPosters;

#[async_trait]
impl PosterOverride for NoopPosters {
    async fn apply(&self, _metas: &mut Vec<Meta>, _override_key: &str) {}
}

/// Watch-history fake: canned recent titles and a canned token grant
pub struct FakeWatchHistory {
    pub titles: Vec<String>,
    pub grant: Option<TokenGrant>,
    pub exchange_calls: AtomicUsize,
}

impl FakeWatchHistory {
    pub fn new(titles: Vec<String>) -> Self {
        Self {
            titles,
            grant: None,
            exchange_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_grant(mut self, access: &str, refresh: &str, expires_at: DateTime<Utc>) -> Self {
        self.grant = Some(TokenGrant {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_at,
        });
        self
    }
}

#[async_trait]
impl WatchHistory for FakeWatchHistory {
    async fn recent_titles(
        &self,
        _access_token: &str,
        _media_type: MediaType,
        _limit: usize,
    ) -> AppResult<Vec<String>> {
        Ok(self.titles.clone())
    }

    async fn exchange_refresh_token(&self, _refresh_token: &str) -> AppResult<TokenGrant> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.grant.clone().ok_or(AppError::RefreshFailed)
    }
}

/// Vault store wrapper counting writes
#[derive(Default)]
pub struct CountingVaultStore {
    inner: MemoryVaultStore,
    pub sets: AtomicUsize,
}

impl CountingVaultStore {
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VaultStore for CountingVaultStore {
    async fn get(&self, user_id: &str) -> AppResult<Option<String>> {
        self.inner.get(user_id).await
    }

    async fn set(&self, user_id: &str, value: String) -> AppResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(user_id, value).await
    }
}

/// Embedder with fixed vectors per text; unknown texts share one direction
pub struct StaticEmbedder {
    pub vectors: HashMap<String, Vec<f32>>,
}

impl StaticEmbedder {
    pub fn new(vectors: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: vectors
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![1.0, 0.0]))
    }
}
