use std::sync::Arc;

use crate::{
    config::Config,
    db::{cache_get, cache_set, CacheKey, ResultCache, SemanticCache},
    error::{AppError, AppResult},
    models::{credentials::resolve_key, Candidate, CredentialBundle, MediaType, Meta},
    services::{
        metadata::TitleResolver,
        oauth::OAuthRefreshManager,
        posters::PosterOverride,
        providers::SelectProvider,
        watch_history::WatchHistory,
    },
};

const RESPONSE_CACHE_TTL: u64 = 3600;

/// Composes credentials, both cache tiers, the LLM step, metadata fan-out
/// and poster overrides into the two request flows.
///
/// Dependency failures degrade: a missing key, a rejected token refresh or a
/// dead provider each cost only their own contribution, and "no
/// recommendations" is a valid, successful answer. Only malformed requests
/// and vault transport failures surface as errors.
pub struct RecommendationPipeline {
    config: Arc<Config>,
    cache: Arc<dyn ResultCache>,
    semantic: Option<Arc<SemanticCache>>,
    selector: Arc<dyn SelectProvider>,
    resolver: Arc<dyn TitleResolver>,
    posters: Arc<dyn PosterOverride>,
    watch_history: Arc<dyn WatchHistory>,
    refresh_manager: Arc<OAuthRefreshManager>,
}

impl RecommendationPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        cache: Arc<dyn ResultCache>,
        semantic: Option<Arc<SemanticCache>>,
        selector: Arc<dyn SelectProvider>,
        resolver: Arc<dyn TitleResolver>,
        posters: Arc<dyn PosterOverride>,
        watch_history: Arc<dyn WatchHistory>,
        refresh_manager: Arc<OAuthRefreshManager>,
    ) -> Self {
        Self {
            config,
            cache,
            semantic,
            selector,
            resolver,
            posters,
            watch_history,
            refresh_manager,
        }
    }

    /// Free-text search flow
    pub async fn search(
        &self,
        query: &str,
        media_type: MediaType,
        bundle: &CredentialBundle,
    ) -> AppResult<Vec<Meta>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        // Guards: everything the full pipeline needs must be present before
        // any external call is made.
        let Some(tmdb_key) = resolve_key(bundle.tmdb_key.as_deref(), &self.config.tmdb_api_key)
        else {
            tracing::debug!("No metadata provider key, degrading to empty result");
            return Ok(Vec::new());
        };
        let provider = match self.selector.select(bundle) {
            Ok(provider) => provider,
            Err(AppError::NoProviderConfigured) => {
                tracing::debug!("No LLM provider configured, degrading to empty result");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if let Some(semantic) = &self.semantic {
            if let Some((mut metas, score)) = semantic.lookup(query, media_type).await {
                tracing::info!(query = %query, score = score, "Serving semantically cached answer");
                self.apply_posters(&mut metas, bundle).await;
                return Ok(metas);
            }
        }

        let search_key = CacheKey::SearchResults {
            media_type,
            query: query.to_string(),
        };
        if let Some(mut metas) = cache_get::<Vec<Meta>>(self.cache.as_ref(), &search_key).await {
            tracing::info!(query = %query, "Serving cached search answer");
            self.apply_posters(&mut metas, bundle).await;
            return Ok(metas);
        }

        let suggestions = match provider
            .recommend(&[query.to_string()], media_type)
            .await
        {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Recommendation step failed, degrading");
                return Ok(Vec::new());
            }
        };

        let mut metas = self
            .resolve_candidates(suggestions.candidates, &suggestions.language, media_type, &tmdb_key)
            .await;

        // Cache only complete answers; an empty batch usually means a
        // transient upstream failure and should not be pinned for an hour.
        if !metas.is_empty() {
            cache_set(self.cache.as_ref(), &search_key, &metas, RESPONSE_CACHE_TTL).await;
            if let Some(semantic) = &self.semantic {
                semantic.index(query, media_type, &search_key, &metas).await;
            }
        }

        self.apply_posters(&mut metas, bundle).await;
        Ok(metas)
    }

    /// Watch-history flow
    pub async fn recent(
        &self,
        user_id: &str,
        media_type: MediaType,
        bundle: &CredentialBundle,
    ) -> AppResult<Vec<Meta>> {
        let has_trakt = bundle
            .trakt_key
            .as_deref()
            .is_some_and(|token| !token.is_empty());
        let Some(tmdb_key) = resolve_key(bundle.tmdb_key.as_deref(), &self.config.tmdb_api_key)
        else {
            tracing::debug!(user_id = %user_id, "Missing credentials for watch-history flow");
            return Ok(Vec::new());
        };

        if user_id.is_empty() || !has_trakt || !bundle.has_llm_key() {
            tracing::debug!(user_id = %user_id, "Missing credentials for watch-history flow");
            return Ok(Vec::new());
        }

        let recent_key = CacheKey::UserRecent {
            user_id: user_id.to_string(),
            media_type,
        };
        if let Some(mut metas) = cache_get::<Vec<Meta>>(self.cache.as_ref(), &recent_key).await {
            tracing::info!(user_id = %user_id, "Serving cached watch-history answer");
            self.apply_posters(&mut metas, bundle).await;
            return Ok(metas);
        }

        let bundle = match self
            .refresh_manager
            .refresh_if_expired(user_id, bundle.clone())
            .await
        {
            Ok((bundle, _refreshed)) => bundle,
            Err(AppError::RefreshFailed) => {
                // Watch history is unavailable for this request; nothing else
                // can answer it once the response cache has missed.
                tracing::warn!(user_id = %user_id, "Token refresh failed, degrading");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let access_token = bundle.trakt_key.clone().unwrap_or_default();
        let titles = match self
            .watch_history
            .recent_titles(&access_token, media_type, self.config.search_count)
            .await
        {
            Ok(titles) => titles,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Watch history unavailable, degrading");
                return Ok(Vec::new());
            }
        };

        if titles.is_empty() {
            return Ok(Vec::new());
        }

        let provider = match self.selector.select(&bundle) {
            Ok(provider) => provider,
            Err(AppError::NoProviderConfigured) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let suggestions = match provider.recommend(&titles, media_type).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Recommendation step failed, degrading");
                return Ok(Vec::new());
            }
        };

        let mut metas = self
            .resolve_candidates(suggestions.candidates, &suggestions.language, media_type, &tmdb_key)
            .await;

        if !metas.is_empty() {
            cache_set(self.cache.as_ref(), &recent_key, &metas, RESPONSE_CACHE_TTL).await;
        }

        self.apply_posters(&mut metas, &bundle).await;
        Ok(metas)
    }

    /// Concurrent metadata fan-out. Every candidate resolves independently;
    /// the batch waits for all of them and keeps whichever came back
    /// renderable — an all-failed batch is an empty success, not an error.
    async fn resolve_candidates(
        &self,
        candidates: Vec<Candidate>,
        language: &str,
        media_type: MediaType,
        api_key: &str,
    ) -> Vec<Meta> {
        let mut tasks = Vec::new();
        for candidate in candidates {
            let resolver = self.resolver.clone();
            let language = language.to_string();
            let api_key = api_key.to_string();
            tasks.push(tokio::spawn(async move {
                resolver
                    .resolve(&candidate.title, &language, media_type, &api_key)
                    .await
            }));
        }

        let total = tasks.len();
        let mut metas = Vec::new();
        let mut stats = ResolutionStats::default();

        for task in tasks {
            match task.await {
                Ok(resolution) => {
                    stats.record(&resolution);
                    if resolution.meta.is_renderable() {
                        metas.push(resolution.meta);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Metadata resolution task panicked");
                    stats.unresolved += 1;
                }
            }
        }

        tracing::info!(
            total = total,
            resolved = metas.len(),
            from_cache = stats.from_cache,
            from_provider = stats.from_provider,
            cache_written = stats.cache_written,
            unresolved = stats.unresolved,
            "Metadata fan-out settled"
        );

        metas
    }

    async fn apply_posters(&self, metas: &mut Vec<Meta>, bundle: &CredentialBundle) {
        let Some(rpdb_key) = bundle.rpdb_key.as_deref().filter(|key| !key.is_empty()) else {
            return;
        };
        self.posters.apply(metas, rpdb_key).await;
    }
}

#[derive(Debug, Default)]
struct ResolutionStats {
    from_cache: usize,
    from_provider: usize,
    cache_written: usize,
    unresolved: usize,
}

impl ResolutionStats {
    fn record(&mut self, resolution: &crate::services::metadata::Resolution) {
        if !resolution.meta.is_renderable() {
            self.unresolved += 1;
        } else if resolution.from_cache {
            self.from_cache += 1;
        } else {
            self.from_provider += 1;
        }
        if resolution.cache_written {
            self.cache_written += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::semantic::MockEmbedder;
    use crate::db::{MemoryCache, SemanticCache};
    use crate::models::Suggestions;
    use crate::services::metadata::{MockTitleResolver, Resolution};
    use crate::services::posters::MockPosterOverride;
    use crate::services::providers::{
        MockRecommendationProvider, MockSelectProvider, RecommendationProvider,
    };
    use crate::services::watch_history::MockWatchHistory;
    use crate::vault::{CredentialVault, MemoryVaultStore};
    use chrono::{Duration, Utc};
    use mockall::predicate::always;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
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
        })
    }

    fn resolved_meta(id: &str, name: &str) -> Meta {
        Meta {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            media_type: MediaType::Movie,
            poster: Some(format!("https://image.tmdb.org/t/p/w500/{}.jpg", id)),
            poster_shape: "poster".to_string(),
            release_year: Some("2010".to_string()),
        }
    }

    fn authed_bundle() -> CredentialBundle {
        CredentialBundle {
            tmdb_key: Some("user-tmdb".to_string()),
            google_key: Some("user-google".to_string()),
            ..Default::default()
        }
    }

    fn suggestions(titles: &[&str]) -> Suggestions {
        Suggestions {
            candidates: titles
                .iter()
                .map(|title| Candidate {
                    title: title.to_string(),
                    year: None,
                    reason: String::new(),
                })
                .collect(),
            language: "en".to_string(),
        }
    }

    struct PipelineBuilder {
        cache: Arc<MemoryCache>,
        semantic: Option<Arc<SemanticCache>>,
        selector: MockSelectProvider,
        resolver: MockTitleResolver,
        posters: MockPosterOverride,
        watch_history: MockWatchHistory,
        vault: Arc<CredentialVault>,
    }

    impl PipelineBuilder {
        fn new() -> Self {
            let mut posters = MockPosterOverride::new();
            posters.expect_apply().returning(|_, _| ());
            Self {
                cache: Arc::new(MemoryCache::default()),
                semantic: None,
                selector: MockSelectProvider::new(),
                resolver: MockTitleResolver::new(),
                posters,
                watch_history: MockWatchHistory::new(),
                vault: Arc::new(CredentialVault::new(
                    Arc::new(MemoryVaultStore::default()),
                    [7u8; 32],
                )),
            }
        }

        fn selecting(mut self, provider: MockRecommendationProvider) -> Self {
            let provider: Arc<dyn RecommendationProvider> = Arc::new(provider);
            self.selector
                .expect_select()
                .returning(move |_| Ok(provider.clone()));
            self
        }

        fn build(self) -> (RecommendationPipeline, Arc<MemoryCache>) {
            let cache = self.cache.clone();
            let refresh_manager = Arc::new(OAuthRefreshManager::new(
                self.vault.clone(),
                Arc::new(MockWatchHistory::new()),
            ));
            let pipeline = RecommendationPipeline::new(
                test_config(),
                self.cache,
                self.semantic,
                Arc::new(self.selector),
                Arc::new(self.resolver),
                Arc::new(self.posters),
                Arc::new(self.watch_history),
                refresh_manager,
            );
            (pipeline, cache)
        }
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let (pipeline, _cache) = PipelineBuilder::new().build();
        let result = pipeline
            .search("   ", MediaType::Movie, &authed_bundle())
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_search_without_metadata_key_degrades_before_any_call() {
        let mut builder = PipelineBuilder::new();
        builder.selector.expect_select().never();

        let (pipeline, _cache) = builder.build();
        let bundle = CredentialBundle {
            google_key: Some("user-google".to_string()),
            ..Default::default()
        };
        let metas = pipeline
            .search("space adventure", MediaType::Movie, &bundle)
            .await
            .unwrap();
        assert!(metas.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_llm_provider_degrades() {
        let mut builder = PipelineBuilder::new();
        builder
            .selector
            .expect_select()
            .returning(|_| Err(AppError::NoProviderConfigured));

        let (pipeline, _cache) = builder.build();
        let metas = pipeline
            .search("space adventure", MediaType::Movie, &authed_bundle())
            .await
            .unwrap();
        assert!(metas.is_empty());
    }

    #[tokio::test]
    async fn test_search_full_pipeline_caches_and_responds() {
        let mut provider = MockRecommendationProvider::new();
        provider
            .expect_recommend()
            .times(1)
            .returning(|_, _| Ok(suggestions(&["Moon", "Sunshine", "Coherence"])));

        let mut builder = PipelineBuilder::new().selecting(provider);
        builder.resolver.expect_resolve().returning(|title, _, _, _| {
            Resolution {
                meta: resolved_meta("tt-id", title),
                from_cache: false,
                cache_written: true,
            }
        });

        let (pipeline, cache) = builder.build();
        let metas = pipeline
            .search("space adventure", MediaType::Movie, &authed_bundle())
            .await
            .unwrap();

        assert_eq!(metas.len(), 3);

        let key = CacheKey::SearchResults {
            media_type: MediaType::Movie,
            query: "space adventure".to_string(),
        };
        let cached: Vec<Meta> = cache_get(cache.as_ref(), &key).await.unwrap();
        assert_eq!(cached.len(), 3);
    }

    #[tokio::test]
    async fn test_search_exact_cache_hit_skips_llm() {
        let mut provider = MockRecommendationProvider::new();
        provider.expect_recommend().never();

        let mut builder = PipelineBuilder::new().selecting(provider);
        builder.resolver.expect_resolve().never();

        let (pipeline, cache) = builder.build();
        let key = CacheKey::SearchResults {
            media_type: MediaType::Movie,
            query: "space adventure".to_string(),
        };
        cache_set(
            cache.as_ref(),
            &key,
            &vec![resolved_meta("tt1", "Moon")],
            3600,
        )
        .await;

        let metas = pipeline
            .search("Space Adventure", MediaType::Movie, &authed_bundle())
            .await
            .unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].id.as_deref(), Some("tt1"));
    }

    #[tokio::test]
    async fn test_search_semantic_hit_skips_llm_and_metadata() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![1.0, 0.0]));
        let semantic = Arc::new(SemanticCache::new(Arc::new(embedder), 0.95));

        let mut provider = MockRecommendationProvider::new();
        provider.expect_recommend().never();

        let mut builder = PipelineBuilder::new().selecting(provider);
        builder.resolver.expect_resolve().never();
        builder.semantic = Some(semantic.clone());

        let key = CacheKey::SearchResults {
            media_type: MediaType::Movie,
            query: "space adventure".to_string(),
        };
        semantic
            .index(
                "space adventure",
                MediaType::Movie,
                &key,
                &[resolved_meta("tt1", "Moon")],
            )
            .await;

        let (pipeline, _cache) = builder.build();
        let metas = pipeline
            .search("space adventures", MediaType::Movie, &authed_bundle())
            .await
            .unwrap();
        assert_eq!(metas.len(), 1);
    }

    #[tokio::test]
    async fn test_search_below_threshold_runs_full_pipeline() {
        let mut embedder = MockEmbedder::new();
        // Indexed at [1, 0]; looked up at cos = 0.8 — below the 0.95 gate
        embedder
            .expect_embed()
            .with(mockall::predicate::eq("space adventure"))
            .returning(|_| Ok(vec![1.0, 0.0]));
        embedder
            .expect_embed()
            .with(mockall::predicate::eq("ocean documentary"))
            .returning(|_| Ok(vec![0.8, 0.6]));
        let semantic = Arc::new(SemanticCache::new(Arc::new(embedder), 0.95));

        let mut provider = MockRecommendationProvider::new();
        provider
            .expect_recommend()
            .times(1)
            .returning(|_, _| Ok(suggestions(&["Moon"])));

        let mut builder = PipelineBuilder::new().selecting(provider);
        builder.resolver.expect_resolve().returning(|title, _, _, _| {
            Resolution {
                meta: resolved_meta("tt-new", title),
                from_cache: false,
                cache_written: true,
            }
        });
        builder.semantic = Some(semantic.clone());

        let key = CacheKey::SearchResults {
            media_type: MediaType::Movie,
            query: "space adventure".to_string(),
        };
        semantic
            .index(
                "space adventure",
                MediaType::Movie,
                &key,
                &[resolved_meta("tt1", "Moon")],
            )
            .await;

        let (pipeline, _cache) = builder.build();
        let metas = pipeline
            .search("ocean documentary", MediaType::Movie, &authed_bundle())
            .await
            .unwrap();
        assert_eq!(metas[0].id.as_deref(), Some("tt-new"));
    }

    #[tokio::test]
    async fn test_search_partial_fanout_failure_keeps_survivors() {
        let mut provider = MockRecommendationProvider::new();
        provider
            .expect_recommend()
            .returning(|_, _| Ok(suggestions(&["Moon", "Ghost Title", "Coherence"])));

        let mut builder = PipelineBuilder::new().selecting(provider);
        builder.resolver.expect_resolve().returning(|title, _, _, _| {
            if title == "Ghost Title" {
                Resolution {
                    meta: Meta::unresolved(MediaType::Movie),
                    from_cache: false,
                    cache_written: false,
                }
            } else {
                Resolution {
                    meta: resolved_meta("tt-ok", title),
                    from_cache: false,
                    cache_written: true,
                }
            }
        });

        let (pipeline, _cache) = builder.build();
        let metas = pipeline
            .search("space adventure", MediaType::Movie, &authed_bundle())
            .await
            .unwrap();
        assert_eq!(metas.len(), 2);
    }

    #[tokio::test]
    async fn test_search_all_failed_fanout_is_empty_success_uncached() {
        let mut provider = MockRecommendationProvider::new();
        provider
            .expect_recommend()
            .returning(|_, _| Ok(suggestions(&["Ghost A", "Ghost B"])));

        let mut builder = PipelineBuilder::new().selecting(provider);
        builder.resolver.expect_resolve().returning(|_, _, media_type, _| Resolution {
            meta: Meta::unresolved(media_type),
            from_cache: false,
            cache_written: false,
        });

        let (pipeline, cache) = builder.build();
        let metas = pipeline
            .search("space adventure", MediaType::Movie, &authed_bundle())
            .await
            .unwrap();
        assert!(metas.is_empty());

        let key = CacheKey::SearchResults {
            media_type: MediaType::Movie,
            query: "space adventure".to_string(),
        };
        assert!(cache_get::<Vec<Meta>>(cache.as_ref(), &key).await.is_none());
    }

    #[tokio::test]
    async fn test_search_llm_failure_degrades() {
        let mut provider = MockRecommendationProvider::new();
        provider
            .expect_recommend()
            .returning(|_, _| Err(AppError::ExternalApi("model down".to_string())));

        let builder = PipelineBuilder::new().selecting(provider);
        let (pipeline, _cache) = builder.build();
        let metas = pipeline
            .search("space adventure", MediaType::Movie, &authed_bundle())
            .await
            .unwrap();
        assert!(metas.is_empty());
    }

    fn trakt_bundle() -> CredentialBundle {
        CredentialBundle {
            tmdb_key: Some("user-tmdb".to_string()),
            google_key: Some("user-google".to_string()),
            trakt_key: Some("access".to_string()),
            trakt_refresh: Some("refresh".to_string()),
            trakt_expires_at: Some(Utc::now() + Duration::hours(1)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_recent_without_trakt_token_degrades() {
        let (pipeline, _cache) = PipelineBuilder::new().build();
        let metas = pipeline
            .recent("u-1", MediaType::Movie, &authed_bundle())
            .await
            .unwrap();
        assert!(metas.is_empty());
    }

    #[tokio::test]
    async fn test_recent_cache_hit_skips_everything() {
        let mut builder = PipelineBuilder::new();
        builder.selector.expect_select().never();
        builder.watch_history.expect_recent_titles().never();

        let (pipeline, cache) = builder.build();
        let key = CacheKey::UserRecent {
            user_id: "u-1".to_string(),
            media_type: MediaType::Movie,
        };
        cache_set(
            cache.as_ref(),
            &key,
            &vec![resolved_meta("tt1", "Moon")],
            3600,
        )
        .await;

        let metas = pipeline
            .recent("u-1", MediaType::Movie, &trakt_bundle())
            .await
            .unwrap();
        assert_eq!(metas.len(), 1);
    }

    #[tokio::test]
    async fn test_recent_full_flow_caches_under_user_key() {
        let mut provider = MockRecommendationProvider::new();
        provider
            .expect_recommend()
            .withf(|seeds, _| seeds == ["Alien", "Sunshine"])
            .returning(|_, _| Ok(suggestions(&["Moon"])));

        let mut builder = PipelineBuilder::new().selecting(provider);
        builder
            .watch_history
            .expect_recent_titles()
            .with(always(), always(), always())
            .returning(|_, _, _| Ok(vec!["Alien".to_string(), "Sunshine".to_string()]));
        builder.resolver.expect_resolve().returning(|title, _, _, _| {
            Resolution {
                meta: resolved_meta("tt-moon", title),
                from_cache: false,
                cache_written: true,
            }
        });

        let (pipeline, cache) = builder.build();
        let metas = pipeline
            .recent("u-1", MediaType::Movie, &trakt_bundle())
            .await
            .unwrap();
        assert_eq!(metas.len(), 1);

        let key = CacheKey::UserRecent {
            user_id: "u-1".to_string(),
            media_type: MediaType::Movie,
        };
        let cached: Vec<Meta> = cache_get(cache.as_ref(), &key).await.unwrap();
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_recent_watch_history_outage_degrades() {
        let mut builder = PipelineBuilder::new();
        builder
            .watch_history
            .expect_recent_titles()
            .returning(|_, _, _| Err(AppError::ExternalApi("down".to_string())));
        builder.selector.expect_select().never();

        let (pipeline, _cache) = builder.build();
        let metas = pipeline
            .recent("u-1", MediaType::Movie, &trakt_bundle())
            .await
            .unwrap();
        assert!(metas.is_empty());
    }

    #[tokio::test]
    async fn test_recent_refresh_failure_degrades() {
        let mut builder = PipelineBuilder::new();
        builder.selector.expect_select().never();
        builder.watch_history.expect_recent_titles().never();

        let (pipeline, _cache) = builder.build();
        let mut bundle = trakt_bundle();
        // Expired with no refresh token stored: the refresh step fails
        bundle.trakt_expires_at = Some(Utc::now() - Duration::hours(1));
        bundle.trakt_refresh = None;

        let metas = pipeline
            .recent("u-1", MediaType::Movie, &bundle)
            .await
            .unwrap();
        assert!(metas.is_empty());
    }
}
