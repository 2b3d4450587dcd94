use std::sync::Arc;

use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    db::{cache_get, cache_set, CacheKey, ResultCache},
    error::{AppError, AppResult},
    models::{MediaType, Meta},
};

const META_CACHE_TTL: u64 = 604800; // 1 week
const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

/// Outcome of one title resolution, with cache provenance for stats logging
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub meta: Meta,
    pub from_cache: bool,
    pub cache_written: bool,
}

/// Resolves a candidate title to a canonical, poster-decorated record.
///
/// Implementations never fail the caller: any provider error becomes the
/// unresolved sentinel record, so one bad title cannot abort a fan-out batch.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TitleResolver: Send + Sync {
    async fn resolve(
        &self,
        title: &str,
        language: &str,
        media_type: MediaType,
        api_key: &str,
    ) -> Resolution;
}

/// TMDB-backed resolver with deduplicated per-title caching
pub struct TmdbResolver {
    http_client: HttpClient,
    cache: Arc<dyn ResultCache>,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(alias = "name")]
    title: Option<String>,
    #[serde(alias = "first_air_date")]
    release_date: Option<String>,
    poster_path: Option<String>,
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    imdb_id: Option<String>,
}

impl TmdbResolver {
    pub fn new(cache: Arc<dyn ResultCache>, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            cache,
            api_url,
        }
    }

    /// Search, then fetch details with external ids. Errors bubble to the
    /// caller in `resolve`, which converts them to the sentinel.
    async fn fetch_from_provider(
        &self,
        title: &str,
        language: &str,
        media_type: MediaType,
        api_key: &str,
    ) -> AppResult<Meta> {
        let search_url = format!("{}/3/search/{}", self.api_url, media_type.tmdb_path());
        let response = self
            .http_client
            .get(&search_url)
            .query(&[
                ("api_key", api_key),
                ("query", title),
                ("language", language),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Metadata search returned status {}",
                response.status()
            )));
        }

        let search: SearchResponse = response.json().await?;
        let Some(first) = search.results.first() else {
            tracing::debug!(title = %title, "No metadata search results");
            return Ok(Meta::unresolved(media_type));
        };

        let details_url = format!(
            "{}/3/{}/{}",
            self.api_url,
            media_type.tmdb_path(),
            first.id
        );
        let response = self
            .http_client
            .get(&details_url)
            .query(&[
                ("api_key", api_key),
                ("append_to_response", "external_ids"),
                ("language", language),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Metadata details returned status {}",
                response.status()
            )));
        }

        let details: DetailsResponse = response.json().await?;
        let Some(imdb_id) = details
            .external_ids
            .and_then(|ids| ids.imdb_id)
            .filter(|id| !id.is_empty())
        else {
            return Ok(Meta::unresolved(media_type));
        };

        Ok(Meta {
            id: Some(imdb_id),
            name: details.title,
            media_type,
            poster: details
                .poster_path
                .map(|path| format!("{}{}", IMAGE_BASE_URL, path)),
            poster_shape: "poster".to_string(),
            release_year: details
                .release_date
                .as_deref()
                .and_then(|date| date.split('-').next())
                .filter(|year| !year.is_empty())
                .map(str::to_string),
        })
    }
}

#[async_trait::async_trait]
impl TitleResolver for TmdbResolver {
    async fn resolve(
        &self,
        title: &str,
        language: &str,
        media_type: MediaType,
        api_key: &str,
    ) -> Resolution {
        let name_key = CacheKey::MetaByName {
            media_type,
            title: title.to_string(),
        };

        if let Some(meta) = cache_get::<Meta>(self.cache.as_ref(), &name_key).await {
            tracing::debug!(title = %title, "Metadata cache hit");
            return Resolution {
                meta,
                from_cache: true,
                cache_written: false,
            };
        }

        let meta = match self
            .fetch_from_provider(title, language, media_type, api_key)
            .await
        {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Metadata resolution failed");
                return Resolution {
                    meta: Meta::unresolved(media_type),
                    from_cache: false,
                    cache_written: false,
                };
            }
        };

        // A record is only worth reusing when a client can render it: an
        // unresolved or posterless record is returned but never cached.
        let cache_written = meta.id.is_some() && meta.poster.is_some();
        if cache_written {
            cache_set(self.cache.as_ref(), &name_key, &meta, META_CACHE_TTL).await;
            let id_key = CacheKey::MetaById {
                media_type,
                id: meta.id.clone().unwrap_or_default(),
            };
            cache_set(self.cache.as_ref(), &id_key, &meta, META_CACHE_TTL).await;
        }

        Resolution {
            meta,
            from_cache: false,
            cache_written,
        }
    }
}
