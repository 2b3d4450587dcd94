use std::sync::Arc;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::CredentialBundle,
    services::watch_history::WatchHistory,
    vault::CredentialVault,
};

/// Rotates the watch-history provider's short-lived OAuth tokens.
///
/// The rotated bundle is written back through the vault before the request
/// proceeds, so a refresh lost to a concurrent writer costs at most one more
/// refresh on the next request (last writer wins, by design of the vault).
pub struct OAuthRefreshManager {
    vault: Arc<CredentialVault>,
    watch_history: Arc<dyn WatchHistory>,
}

impl OAuthRefreshManager {
    pub fn new(vault: Arc<CredentialVault>, watch_history: Arc<dyn WatchHistory>) -> Self {
        Self {
            vault,
            watch_history,
        }
    }

    /// Returns the bundle with fresh tokens merged in, and whether a refresh
    /// happened. A bundle without an expiry timestamp is treated as
    /// never-expiring. On provider rejection the stored bundle is left
    /// untouched and `RefreshFailed` surfaces to the caller.
    pub async fn refresh_if_expired(
        &self,
        user_id: &str,
        bundle: CredentialBundle,
    ) -> AppResult<(CredentialBundle, bool)> {
        let Some(expires_at) = bundle.trakt_expires_at else {
            return Ok((bundle, false));
        };

        if expires_at > Utc::now() {
            return Ok((bundle, false));
        }

        let Some(refresh_token) = bundle
            .trakt_refresh
            .clone()
            .filter(|token| !token.is_empty())
        else {
            tracing::warn!(user_id = %user_id, "Token expired but no refresh token stored");
            return Err(AppError::RefreshFailed);
        };

        let grant = self
            .watch_history
            .exchange_refresh_token(&refresh_token)
            .await?;

        let mut updated = bundle;
        updated.merge_oauth_tokens(grant.access_token, grant.refresh_token, grant.expires_at);
        self.vault.put(user_id, &updated).await?;

        tracing::info!(user_id = %user_id, "OAuth tokens rotated");
        Ok((updated, true))
    }
}
