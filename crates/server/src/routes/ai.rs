//! Text completion for the project creation wizard.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, deployment::Deployment, error::ApiError, middleware::RequestUser};

const MAX_PROMPT_CHARS: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectSuggestionRequest {
    pub prompt: String,
}

/// Raw completion text; the client decides whether it parses.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectSuggestionResponse {
    pub text: String,
}

/// POST /api/ai/project-suggestions
pub async fn suggest_project(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    axum::Json(payload): axum::Json<ProjectSuggestionRequest>,
) -> Result<ResponseJson<ApiResponse<ProjectSuggestionResponse>>, ApiError> {
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::bad_request("prompt is required"));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiError::bad_request(format!(
            "prompt is longer than {MAX_PROMPT_CHARS} characters"
        )));
    }

    if !deployment.rate_gate().check(user_id, "project_suggestions").await {
        return Err(ApiError::RateLimited);
    }

    let source = deployment
        .suggestions()
        .ok_or_else(|| ApiError::Unavailable("project suggestions are not configured".to_string()))?;

    let text = source.suggest(prompt).await?;
    debug!(%user_id, chars = text.len(), "Project suggestion generated");

    deployment
        .track_if_analytics_allowed("project_suggestion_generated", serde_json::json!({}))
        .await;

    Ok(ResponseJson(ApiResponse::success(ProjectSuggestionResponse { text })))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/ai/project-suggestions", post(suggest_project))
}
