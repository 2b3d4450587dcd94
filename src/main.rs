use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cinesage::api::{create_router, AppState};
use cinesage::config::Config;
use cinesage::db::{
    create_redis_client, GeminiEmbedder, NoopCache, RedisCache, ResetSchedule, ResultCache,
    SemanticCache,
};
use cinesage::services::{
    KeyBasedSelector, OAuthRefreshManager, RecommendationPipeline, RpdbPosterService, TmdbResolver,
    TraktClient, WatchHistory,
};
use cinesage::vault::{CredentialVault, RedisVaultStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Fails fast on invalid secrets or thresholds
    let config = Arc::new(Config::from_env()?);
    if config.disable_cache {
        tracing::warn!("Caching disabled by configuration");
    }

    let redis_client = create_redis_client(&config.redis_url)?;

    let cache: Arc<dyn ResultCache> = if config.disable_cache {
        Arc::new(NoopCache)
    } else {
        Arc::new(RedisCache::new(redis_client.clone()))
    };

    let semantic = if config.disable_cache {
        None
    } else {
        let embedder = Arc::new(GeminiEmbedder::new(config.gemini_api_key.clone()));
        Some(Arc::new(SemanticCache::new(
            embedder,
            config.semantic_proximity,
        )))
    };

    // The credential store is not a cache: it stays on redis regardless of
    // the cache-disable flag, and its entries never expire.
    let vault = Arc::new(CredentialVault::from_hex_key(
        Arc::new(RedisVaultStore::new(redis_client)),
        &config.encryption_key,
    )?);

    let watch_history: Arc<dyn WatchHistory> = Arc::new(TraktClient::new(
        config.trakt_client_id.clone(),
        config.trakt_client_secret.clone(),
        config.trakt_api_url.clone(),
    ));
    let refresh_manager = Arc::new(OAuthRefreshManager::new(
        vault.clone(),
        watch_history.clone(),
    ));

    let pipeline = Arc::new(RecommendationPipeline::new(
        config.clone(),
        cache.clone(),
        semantic.clone(),
        Arc::new(KeyBasedSelector::new(config.clone())),
        // Per-title metadata shares the response cache backend
        Arc::new(TmdbResolver::new(cache, config.tmdb_api_url.clone())),
        Arc::new(RpdbPosterService::new(config.rpdb_api_url.clone())),
        watch_history,
        refresh_manager,
    ));

    if let Some(semantic) = semantic {
        spawn_semantic_reset(semantic, &config.reset_vector_cron)?;
    }

    let state = AppState::new(config.clone(), vault, pipeline);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!(host = %config.host, port = config.port, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Clears the semantic index on the configured cron-like schedule
fn spawn_semantic_reset(semantic: Arc<SemanticCache>, cron: &str) -> anyhow::Result<()> {
    let schedule: ResetSchedule = cron
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid RESET_VECTOR_CRON: {}", e))?;

    tokio::spawn(async move {
        loop {
            let now = chrono::Utc::now();
            let Some(next) = schedule.next_after(now) else {
                tracing::error!("Reset schedule has no future fire time, stopping");
                break;
            };

            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(next = %next, "Next semantic index reset scheduled");
            tokio::time::sleep(wait).await;
            semantic.reset().await;
        }
    });

    Ok(())
}
