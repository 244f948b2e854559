//! Everything a route handler can reach: database, suggestion client, rate gate.

use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use services::services::{claude_api::ClaudeApiClient, project_suggestions::SuggestionSource};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::Config,
    middleware::rate_gate::{AllowAll, RateGate},
};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("database initialisation failed: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    fn db(&self) -> &DBService;

    /// `None` when no completion backend is configured.
    fn suggestions(&self) -> Option<&Arc<dyn SuggestionSource>>;

    fn rate_gate(&self) -> &Arc<dyn RateGate>;

    async fn track_if_analytics_allowed(&self, event_name: &str, properties: serde_json::Value);
}

#[derive(Clone)]
pub struct LocalDeployment {
    db: DBService,
    suggestions: Option<Arc<dyn SuggestionSource>>,
    rate_gate: Arc<dyn RateGate>,
    analytics_enabled: bool,
}

impl LocalDeployment {
    pub fn new(db: DBService) -> Self {
        Self {
            db,
            suggestions: None,
            rate_gate: Arc::new(AllowAll),
            analytics_enabled: false,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        let mut deployment = Self::new(db);
        deployment.analytics_enabled = config.analytics_enabled;

        match &config.anthropic_api_key {
            Some(key) => match ClaudeApiClient::new(key.clone(), config.anthropic_model.clone()) {
                Ok(client) => {
                    info!(model = client.model(), "Project suggestions enabled");
                    deployment = deployment.with_suggestions(Arc::new(client));
                }
                Err(e) => warn!(error = %e, "Project suggestions disabled"),
            },
            None => info!("ANTHROPIC_API_KEY not set, project suggestions disabled"),
        }

        Ok(deployment)
    }

    pub fn with_suggestions(mut self, source: Arc<dyn SuggestionSource>) -> Self {
        self.suggestions = Some(source);
        self
    }

    pub fn with_rate_gate(mut self, gate: Arc<dyn RateGate>) -> Self {
        self.rate_gate = gate;
        self
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    fn db(&self) -> &DBService {
        &self.db
    }

    fn suggestions(&self) -> Option<&Arc<dyn SuggestionSource>> {
        self.suggestions.as_ref()
    }

    fn rate_gate(&self) -> &Arc<dyn RateGate> {
        &self.rate_gate
    }

    async fn track_if_analytics_allowed(&self, event_name: &str, properties: serde_json::Value) {
        if self.analytics_enabled {
            info!(target: "analytics", event = event_name, %properties, "Event");
        }
    }
}
