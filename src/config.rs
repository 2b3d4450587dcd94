use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Redis connection URL (exact-match cache + encrypted credential store)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Disables both cache tiers when true
    #[serde(default)]
    pub disable_cache: bool,

    /// 64-char hex string, decoded to the 32-byte AES-256 vault key
    pub encryption_key: String,

    /// Operator's Google AI key; backs the embedder and the "default" sentinel
    pub gemini_api_key: String,

    /// Operator's metadata-provider key; backs the "default" sentinel
    pub tmdb_api_key: String,

    /// Metadata provider base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Watch-history provider OAuth client credentials
    pub trakt_client_id: String,
    pub trakt_client_secret: String,

    /// Watch-history provider base URL
    #[serde(default = "default_trakt_api_url")]
    pub trakt_api_url: String,

    /// Poster override provider base URL
    #[serde(default = "default_rpdb_api_url")]
    pub rpdb_api_url: String,

    /// Model identifiers per LLM provider
    #[serde(default = "default_google_model")]
    pub google_model: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Number of candidates requested from the LLM step
    #[serde(default = "default_search_count")]
    pub search_count: usize,

    /// Semantic cache acceptance threshold, in [0.0, 1.0]
    #[serde(default = "default_semantic_proximity")]
    pub semantic_proximity: f64,

    /// Cron-like schedule for the wholesale semantic index reset
    #[serde(default = "default_reset_vector_cron")]
    pub reset_vector_cron: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org".to_string()
}

fn default_trakt_api_url() -> String {
    "https://api.trakt.tv".to_string()
}

fn default_rpdb_api_url() -> String {
    "https://api.ratingposterdb.com".to_string()
}

fn default_google_model() -> String {
    "gemini-2.0-flash-lite-preview-02-05".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_search_count() -> usize {
    20
}

fn default_semantic_proximity() -> f64 {
    0.95
}

fn default_reset_vector_cron() -> String {
    "0 0 1 * *".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config =
            envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Startup-time invariant checks; a failure here prevents boot
    pub fn validate(&self) -> anyhow::Result<()> {
        let key = hex::decode(&self.encryption_key)
            .map_err(|e| anyhow::anyhow!("ENCRYPTION_KEY is not valid hex: {}", e))?;
        if key.len() != 32 {
            anyhow::bail!(
                "Invalid ENCRYPTION_KEY length: {} bytes, expected 32 bytes for AES-256. Must be a 64-char hex string.",
                key.len()
            );
        }

        if !(0.0..=1.0).contains(&self.semantic_proximity) {
            anyhow::bail!(
                "SEMANTIC_PROXIMITY must be a float between 0.0 and 1.0, got {}",
                self.semantic_proximity
            );
        }

        if self.search_count == 0 {
            anyhow::bail!("SEARCH_COUNT must be positive");
        }

        Ok(())
    }
}
