use chrono::{DateTime, Duration, Utc};
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::MediaType,
};

/// A rotated OAuth token set from the watch-history provider
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Watch-history provider boundary: recent-activity titles and the OAuth
/// token exchange. Only title extraction is consumed here; the provider's
/// full event schema stays its own concern.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WatchHistory: Send + Sync {
    async fn recent_titles(
        &self,
        access_token: &str,
        media_type: MediaType,
        limit: usize,
    ) -> AppResult<Vec<String>>;

    async fn exchange_refresh_token(&self, refresh_token: &str) -> AppResult<TokenGrant>;
}

/// Trakt-backed watch-history client
pub struct TraktClient {
    http_client: HttpClient,
    client_id: String,
    client_secret: String,
    api_url: String,
}

impl TraktClient {
    pub fn new(client_id: String, client_secret: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            client_id,
            client_secret,
            api_url,
        }
    }

    fn history_path(media_type: MediaType) -> &'static str {
        match media_type {
            MediaType::Movie => "movies",
            MediaType::Series => "shows",
        }
    }
}

#[derive(Debug, Deserialize)]
struct HistoryEvent {
    movie: Option<HistoryItem>,
    show: Option<HistoryItem>,
}

#[derive(Debug, Deserialize)]
struct HistoryItem {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    created_at: i64,
}

#[async_trait::async_trait]
impl WatchHistory for TraktClient {
    async fn recent_titles(
        &self,
        access_token: &str,
        media_type: MediaType,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let url = format!(
            "{}/users/me/history/{}",
            self.api_url,
            Self::history_path(media_type)
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .header("trakt-api-version", "2")
            .header("trakt-api-key", &self.client_id)
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Watch-history API returned status {}: {}",
                status, body
            )));
        }

        let events: Vec<HistoryEvent> = response.json().await?;
        let titles: Vec<String> = events
            .into_iter()
            .filter_map(|event| match media_type {
                MediaType::Movie => event.movie.and_then(|m| m.title),
                MediaType::Series => event.show.and_then(|s| s.title),
            })
            .collect();

        tracing::info!(
            media_type = %media_type,
            titles = titles.len(),
            "Recent watch history fetched"
        );

        Ok(titles)
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> AppResult<TokenGrant> {
        let url = format!("{}/oauth/token", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "refresh_token": refresh_token,
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "grant_type": "refresh_token"
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(
                status = %response.status(),
                "Watch-history provider rejected refresh token"
            );
            return Err(AppError::RefreshFailed);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|_| AppError::RefreshFailed)?;

        let issued_at = DateTime::<Utc>::from_timestamp(token.created_at, 0)
            .unwrap_or_else(Utc::now);

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: issued_at + Duration::seconds(token.expires_in),
        })
    }
}
