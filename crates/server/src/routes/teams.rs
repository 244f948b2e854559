use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::team::{AddTeamMember, CreateTeam, Team, TeamMember};
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, deployment::Deployment, error::ApiError, middleware::RequestUser};

/// GET /api/teams
pub async fn get_teams(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
) -> Result<ResponseJson<ApiResponse<Vec<Team>>>, ApiError> {
    let teams = Team::find_for_user(&deployment.db().pool, user_id).await?;
    Ok(ResponseJson(ApiResponse::success(teams)))
}

/// POST /api/teams
pub async fn create_team(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    axum::Json(mut payload): axum::Json<CreateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    payload.name = payload.name.trim().to_string();
    if payload.name.is_empty() {
        return Err(ApiError::bad_request("team name is required"));
    }

    let team = Team::create(&deployment.db().pool, user_id, &payload).await?;
    info!(%user_id, team_id = %team.id, "Team created");

    deployment
        .track_if_analytics_allowed(
            "team_created",
            serde_json::json!({
                "team_id": team.id.to_string(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(team)))
}

/// GET /api/teams/{id}/members
pub async fn get_team_members(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(team_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<TeamMember>>>, ApiError> {
    let pool = &deployment.db().pool;
    if !Team::is_accessible(pool, team_id, user_id).await? {
        return Err(ApiError::NotFound("team"));
    }
    let members = Team::members(pool, team_id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

/// POST /api/teams/{id}/members
/// Owner only; re-adding an existing member updates their role.
pub async fn add_team_member(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(team_id): Path<Uuid>,
    axum::Json(payload): axum::Json<AddTeamMember>,
) -> Result<ResponseJson<ApiResponse<TeamMember>>, ApiError> {
    let member = Team::add_member(&deployment.db().pool, user_id, team_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("team"))?;
    info!(%team_id, member = %member.user_id, role = %member.role, "Team member added");
    Ok(ResponseJson(ApiResponse::success(member)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/teams", get(get_teams).post(create_team))
        .route("/teams/{id}/members", post(add_team_member).get(get_team_members))
}
