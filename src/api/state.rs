use std::sync::Arc;

use crate::config::Config;
use crate::services::RecommendationPipeline;
use crate::vault::CredentialVault;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub vault: Arc<CredentialVault>,
    pub pipeline: Arc<RecommendationPipeline>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        vault: Arc<CredentialVault>,
        pipeline: Arc<RecommendationPipeline>,
    ) -> Self {
        Self {
            config,
            vault,
            pipeline,
        }
    }
}
