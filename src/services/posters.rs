use reqwest::Client as HttpClient;

use crate::models::Meta;

/// Substitutes higher-quality poster URLs where the override provider has
/// one. Best-effort by contract: a missing or invalid key is a no-op, and a
/// failed probe leaves the record's original poster in place.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PosterOverride: Send + Sync {
    async fn apply(&self, metas: &mut Vec<Meta>, override_key: &str);
}

/// RatingPosterDB-style override service
pub struct RpdbPosterService {
    http_client: HttpClient,
    api_url: String,
}

impl RpdbPosterService {
    pub fn new(api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
        }
    }

    fn poster_url(&self, override_key: &str, imdb_id: &str) -> String {
        format!(
            "{}/{}/imdb/poster-default/{}.jpg",
            self.api_url, override_key, imdb_id
        )
    }
}

#[async_trait::async_trait]
impl PosterOverride for RpdbPosterService {
    async fn apply(&self, metas: &mut Vec<Meta>, override_key: &str) {
        if override_key.is_empty() {
            return;
        }

        // Probe every record concurrently; only successful probes substitute
        let mut tasks = Vec::new();
        for (index, meta) in metas.iter().enumerate() {
            let Some(imdb_id) = meta.id.clone() else {
                continue;
            };

            let url = self.poster_url(override_key, &imdb_id);
            let client = self.http_client.clone();
            tasks.push(tokio::spawn(async move {
                match client.head(&url).send().await {
                    Ok(response) if response.status().is_success() => Some((index, url)),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::debug!(error = %e, "Poster override probe failed");
                        None
                    }
                }
            }));
        }

        let mut replaced = 0;
        for task in tasks {
            if let Ok(Some((index, url))) = task.await {
                metas[index].poster = Some(url);
                replaced += 1;
            }
        }

        if replaced > 0 {
            tracing::debug!(replaced = replaced, total = metas.len(), "Posters overridden");
        }
    }
}
