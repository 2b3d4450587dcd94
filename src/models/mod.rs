use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub mod credentials;

pub use credentials::CredentialBundle;

/// Kind of content a catalog serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    /// Path segment used by the metadata provider ("tv", not "series")
    pub fn tmdb_path(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "tv",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Series => write!(f, "series"),
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "series" => Ok(MediaType::Series),
            other => Err(format!("Unknown media type: {}", other)),
        }
    }
}

/// A fully resolved, client-renderable recommendation record.
///
/// An `id` of `None` marks a title the metadata provider could not resolve to
/// a canonical identifier; such records are filtered out before caching and
/// before responding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub poster: Option<String>,
    pub poster_shape: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<String>,
}

impl Meta {
    /// Sentinel for a title the provider could not resolve
    pub fn unresolved(media_type: MediaType) -> Self {
        Self {
            id: None,
            name: None,
            media_type,
            poster: None,
            poster_shape: "poster".to_string(),
            release_year: None,
        }
    }

    /// True when the record carries everything a client needs to render it
    pub fn is_renderable(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty()) && self.name.is_some()
    }
}

/// An LLM-proposed title before metadata resolution. Transient — never cached.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Candidate {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub reason: String,
}

/// Output of the recommendation step: bounded candidate list plus the
/// language the model answered in, which steers metadata search locale.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestions {
    pub candidates: Vec<Candidate>,
    pub language: String,
}

/// Catalog response body: `{ "metas": [...] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub metas: Vec<Meta>,
}
