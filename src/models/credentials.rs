use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The full set of a user's third-party keys and tokens.
///
/// Stored only in encrypted form (see `vault`); the decrypted value lives
/// in memory for the duration of a single request. Every field is optional —
/// users supply whichever providers they use.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialBundle {
    /// Metadata provider key; the literal "default" opts into the operator key
    pub tmdb_key: Option<String>,
    /// Google-style LLM key; the literal "default" opts into the operator key
    pub google_key: Option<String>,
    /// OpenAI-style LLM key
    pub open_ai_key: Option<String>,
    /// Poster override provider key
    pub rpdb_key: Option<String>,
    /// Watch-history provider OAuth access token
    pub trakt_key: Option<String>,
    /// Watch-history provider OAuth refresh token
    pub trakt_refresh: Option<String>,
    /// Access-token expiry; absent means never-expiring (legacy bundles)
    pub trakt_expires_at: Option<DateTime<Utc>>,
}

impl CredentialBundle {
    /// True when at least one LLM backend can be selected from this bundle
    pub fn has_llm_key(&self) -> bool {
        non_empty(&self.google_key).is_some() || non_empty(&self.open_ai_key).is_some()
    }

    /// Merges a rotated token set into the bundle, leaving every other
    /// field untouched.
    pub fn merge_oauth_tokens(
        &mut self,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) {
        self.trakt_key = Some(access_token);
        self.trakt_refresh = Some(refresh_token);
        self.trakt_expires_at = Some(expires_at);
    }
}

/// Resolves a user-supplied key against the operator's configured key.
///
/// The literal "default" is an explicit opt-in to the operator's shared key.
/// Anything else is passed through untouched; absent or empty keys stay
/// absent — invalid user keys are never silently replaced.
pub fn resolve_key(user_key: Option<&str>, operator_key: &str) -> Option<String> {
    match user_key {
        Some("default") => Some(operator_key.to_string()),
        Some(key) if !key.is_empty() => Some(key.to_string()),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bundle_round_trips_camel_case() {
        let json = r#"{
            "tmdbKey": "tmdb-123",
            "googleKey": "g-456",
            "openAiKey": "",
            "rpdbKey": "r-789",
            "traktKey": "t-abc",
            "traktRefresh": "t-def",
            "traktExpiresAt": "2026-01-01T00:00:00Z"
        }"#;

        let bundle: CredentialBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.tmdb_key.as_deref(), Some("tmdb-123"));
        assert_eq!(bundle.google_key.as_deref(), Some("g-456"));
        assert_eq!(
            bundle.trakt_expires_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
        );

        let reparsed: CredentialBundle =
            serde_json::from_str(&serde_json::to_string(&bundle).unwrap()).unwrap();
        assert_eq!(reparsed, bundle);
    }

    #[test]
    fn test_partial_bundle_fills_defaults() {
        let bundle: CredentialBundle = serde_json::from_str(r#"{"googleKey": "g"}"#).unwrap();
        assert_eq!(bundle.google_key.as_deref(), Some("g"));
        assert_eq!(bundle.tmdb_key, None);
        assert_eq!(bundle.trakt_expires_at, None);
    }

    #[test]
    fn test_has_llm_key() {
        let mut bundle = CredentialBundle::default();
        assert!(!bundle.has_llm_key());

        bundle.open_ai_key = Some(String::new());
        assert!(!bundle.has_llm_key());

        bundle.open_ai_key = Some("sk-123".to_string());
        assert!(bundle.has_llm_key());
    }

    #[test]
    fn test_merge_oauth_tokens_leaves_other_fields() {
        let mut bundle = CredentialBundle {
            tmdb_key: Some("tmdb-123".to_string()),
            trakt_key: Some("old-access".to_string()),
            trakt_refresh: Some("old-refresh".to_string()),
            ..Default::default()
        };

        let expires = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        bundle.merge_oauth_tokens("new-access".to_string(), "new-refresh".to_string(), expires);

        assert_eq!(bundle.tmdb_key.as_deref(), Some("tmdb-123"));
        assert_eq!(bundle.trakt_key.as_deref(), Some("new-access"));
        assert_eq!(bundle.trakt_refresh.as_deref(), Some("new-refresh"));
        assert_eq!(bundle.trakt_expires_at, Some(expires));
    }

    #[test]
    fn test_resolve_key_default_sentinel() {
        assert_eq!(
            resolve_key(Some("default"), "operator-key").as_deref(),
            Some("operator-key")
        );
    }

    #[test]
    fn test_resolve_key_passthrough_and_absent() {
        assert_eq!(resolve_key(Some("mine"), "op").as_deref(), Some("mine"));
        assert_eq!(resolve_key(Some(""), "op"), None);
        assert_eq!(resolve_key(None, "op"), None);
    }
}
