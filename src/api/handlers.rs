use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{CatalogResponse, CredentialBundle, MediaType};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKeysRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub keys: CredentialBundle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKeysResponse {
    pub user_id: String,
}

type CatalogReply = (StatusCode, [(header::HeaderName, &'static str); 1], Json<CatalogResponse>);

fn catalog_reply(metas: Vec<crate::models::Meta>) -> CatalogReply {
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "public, max-age=3600")],
        Json(CatalogResponse { metas }),
    )
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Stores a user's credential bundle, encrypted at rest.
///
/// The whole bundle is overwritten on every submission. An absent metadata
/// key is normalized to the "default" sentinel so the catalog flows work out
/// of the box with the operator's shared key.
pub async fn store_keys(
    State(state): State<AppState>,
    Json(request): Json<StoreKeysRequest>,
) -> AppResult<Json<StoreKeysResponse>> {
    if request.user_id.is_empty() {
        return Err(AppError::InvalidInput("User ID required".to_string()));
    }

    let mut keys = request.keys;
    if keys.tmdb_key.as_deref().unwrap_or("").is_empty() {
        keys.tmdb_key = Some("default".to_string());
    }

    state.vault.put(&request.user_id, &keys).await?;

    tracing::info!(user_id = %request.user_id, "Credential bundle stored");
    Ok(Json(StoreKeysResponse {
        user_id: request.user_id,
    }))
}

/// Handler for the free-text search catalog
pub async fn search_catalog(
    State(state): State<AppState>,
    Path((user_id, media_type, query)): Path<(String, String, String)>,
) -> AppResult<CatalogReply> {
    let media_type = parse_media_type(&media_type)?;
    let bundle = load_bundle(&state, &user_id).await?;

    tracing::info!(query = %query, media_type = %media_type, "Received catalog search request");
    let metas = state.pipeline.search(&query, media_type, &bundle).await?;
    Ok(catalog_reply(metas))
}

/// Handler for the watch-history catalog
pub async fn recent_catalog(
    State(state): State<AppState>,
    Path((user_id, media_type)): Path<(String, String)>,
) -> AppResult<CatalogReply> {
    let media_type = parse_media_type(&media_type)?;
    let bundle = load_bundle(&state, &user_id).await?;

    tracing::info!(user_id = %user_id, media_type = %media_type, "Received watch-history request");
    let metas = state.pipeline.recent(&user_id, media_type, &bundle).await?;
    Ok(catalog_reply(metas))
}

fn parse_media_type(raw: &str) -> AppResult<MediaType> {
    raw.parse::<MediaType>().map_err(AppError::InvalidInput)
}

/// Loads a user's bundle. Unknown users and undecryptable payloads both
/// continue as unauthenticated (the pipeline degrades on missing keys);
/// a store that cannot be reached at all is an infrastructure error.
async fn load_bundle(state: &AppState, user_id: &str) -> AppResult<CredentialBundle> {
    match state.vault.get(user_id).await {
        Ok(Some(bundle)) => Ok(bundle),
        Ok(None) => Ok(CredentialBundle::default()),
        Err(AppError::CorruptCredentials) => {
            tracing::warn!(user_id = %user_id, "Corrupt credential payload, treating as unauthenticated");
            Ok(CredentialBundle::default())
        }
        Err(e) => Err(e),
    }
}
