use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::db::cache::{normalize, CacheKey};
use crate::error::{AppError, AppResult};
use crate::models::{MediaType, Meta};

const EMBEDDING_MODEL: &str = "text-embedding-004";

/// Turns a query into an embedding vector. The production implementation
/// calls the operator-configured Google embedding model; tests mock this.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// Google embedding backend
pub struct GeminiEmbedder {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl GeminiEmbedder {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://generativelanguage.googleapis.com".to_string())
    }

    pub fn with_base_url(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!(
            "{}/v1beta/models/{}:embedContent?key={}",
            self.api_url, EMBEDDING_MODEL, self.api_key
        );

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "content": { "parts": [{ "text": text }] }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Embedding API returned status {}: {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct EmbedResponse {
            embedding: EmbeddingValues,
        }
        #[derive(Deserialize)]
        struct EmbeddingValues {
            values: Vec<f32>,
        }

        let parsed: EmbedResponse = response.json().await?;
        Ok(parsed.embedding.values)
    }
}

/// One indexed query. Records the exact-cache key the answer was written
/// under at index time, alongside the fully resolved value itself.
#[derive(Debug, Clone)]
struct SemanticEntry {
    query: String,
    media_type: MediaType,
    cache_key: String,
    metas: Vec<Meta>,
    embedding: Vec<f32>,
}

/// Embedding-proximity cache over answered queries.
///
/// A lookup is a hit only when the closest indexed query of the same media
/// type scores at or above the acceptance threshold. The index is process-
/// local and cleared wholesale on a schedule rather than per-entry expiry.
pub struct SemanticCache {
    embedder: Arc<dyn Embedder>,
    /// Acceptance threshold in [0.0, 1.0]; validated at startup by `Config`
    threshold: f64,
    entries: RwLock<Vec<SemanticEntry>>,
}

impl SemanticCache {
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f64) -> Self {
        Self {
            embedder,
            threshold,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Finds a previously answered query within the similarity threshold.
    /// Embedding failures degrade to a miss — the full pipeline still runs.
    pub async fn lookup(
        &self,
        query: &str,
        media_type: MediaType,
    ) -> Option<(Vec<Meta>, f64)> {
        let normalized = normalize(query);
        let embedding = match self.embedder.embed(&normalized).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(query = %normalized, error = %e, "Embedding failed, semantic miss");
                return None;
            }
        };

        let entries = self.entries.read().await;
        let best = entries
            .iter()
            .filter(|entry| entry.media_type == media_type)
            .filter_map(|entry| {
                cosine_similarity(&embedding, &entry.embedding).map(|score| (entry, score))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        let (entry, score) = best;
        if score >= self.threshold {
            tracing::info!(
                query = %normalized,
                matched = %entry.query,
                key = %entry.cache_key,
                score = score,
                "Semantic cache hit"
            );
            Some((entry.metas.clone(), score))
        } else {
            tracing::debug!(
                query = %normalized,
                best_score = score,
                threshold = self.threshold,
                "Best semantic match below threshold"
            );
            None
        }
    }

    /// Indexes an answered query so near-duplicates short-circuit the LLM.
    /// Re-indexing the same normalized query refreshes its entry in place.
    pub async fn index(
        &self,
        query: &str,
        media_type: MediaType,
        cache_key: &CacheKey,
        metas: &[Meta],
    ) {
        let normalized = normalize(query);
        let embedding = match self.embedder.embed(&normalized).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(query = %normalized, error = %e, "Embedding failed, skipping index");
                return;
            }
        };

        let entry = SemanticEntry {
            query: normalized.clone(),
            media_type,
            cache_key: format!("{}", cache_key),
            metas: metas.to_vec(),
            embedding,
        };

        let mut entries = self.entries.write().await;
        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.media_type == media_type && e.query == normalized)
        {
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    /// Wholesale reset, fired on the configured schedule. Returns the number
    /// of entries dropped.
    pub async fn reset(&self) -> usize {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        tracing::info!(dropped = dropped, "Semantic index reset");
        dropped
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return None;
    }
    Some(dot / denom)
}

/// Five-field cron expression (minute, hour, day-of-month, month,
/// day-of-week) restricted to `*`, numbers, and comma lists — enough for the
/// maintenance schedules this service runs.
#[derive(Debug, Clone)]
pub struct ResetSchedule {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

#[derive(Debug, Clone)]
enum CronField {
    Any,
    Values(Vec<u32>),
}

impl CronField {
    fn matches(&self, value: u32) -> bool {
        match self {
            CronField::Any => true,
            CronField::Values(values) => values.contains(&value),
        }
    }

    fn parse(field: &str, min: u32, max: u32) -> Result<Self, String> {
        if field == "*" {
            return Ok(CronField::Any);
        }

        let mut values = Vec::new();
        for part in field.split(',') {
            let value: u32 = part
                .parse()
                .map_err(|_| format!("Invalid cron field: {}", field))?;
            if value < min || value > max {
                return Err(format!(
                    "Cron value {} out of range [{}, {}]",
                    value, min, max
                ));
            }
            values.push(value);
        }
        Ok(CronField::Values(values))
    }
}

impl FromStr for ResetSchedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!("Expected 5 cron fields, got {}", fields.len()));
        }

        Ok(Self {
            minute: CronField::parse(fields[0], 0, 59)?,
            hour: CronField::parse(fields[1], 0, 23)?,
            day_of_month: CronField::parse(fields[2], 1, 31)?,
            month: CronField::parse(fields[3], 1, 12)?,
            day_of_week: CronField::parse(fields[4], 0, 6)?,
        })
    }
}

impl ResetSchedule {
    fn matches(&self, at: DateTime<Utc>) -> bool {
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.day_of_month.matches(at.day())
            && self.month.matches(at.month())
            && self.day_of_week.matches(at.weekday().num_days_from_sunday())
    }

    /// Next fire time strictly after `after`, scanning minute resolution up
    /// to one year out.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = after
            .duration_trunc(Duration::minutes(1))
            .unwrap_or(after)
            + Duration::minutes(1);
        let horizon = after + Duration::days(366);

        while candidate <= horizon {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}
