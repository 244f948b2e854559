//! Routes for board projects.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::{
    project::{
        CreateProject, Project, ProjectDetails, ProjectListing, ProjectsResponse, UpdateProject,
        UpdateProjectStage, group_by_stage,
    },
    stage::Stage,
    team::Team,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, deployment::Deployment, error::ApiError, middleware::RequestUser};

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub team_id: Option<Uuid>,
    /// Defaults to true.
    pub grouped: Option<bool>,
}

async fn ensure_team_access(pool: &SqlitePool, user_id: Uuid, team_id: Uuid) -> Result<(), ApiError> {
    if Team::is_accessible(pool, team_id, user_id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound("team"))
    }
}

async fn ensure_known_stage(pool: &SqlitePool, user_id: Uuid, slug: &str) -> Result<(), ApiError> {
    if Stage::is_known_slug(pool, user_id, slug).await? {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("unknown stage '{slug}'")))
    }
}

/// GET /api/projects?team_id=&grouped=
pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Query(query): Query<ProjectQuery>,
) -> Result<ResponseJson<ApiResponse<ProjectsResponse>>, ApiError> {
    let pool = &deployment.db().pool;
    if let Some(team_id) = query.team_id {
        ensure_team_access(pool, user_id, team_id).await?;
    }

    let projects = Project::find_active(pool, user_id, query.team_id).await?;
    let grouped = query.grouped.unwrap_or(true);
    debug!(%user_id, count = projects.len(), grouped, "Listing projects");

    let projects = if grouped {
        let slugs = Stage::known_slugs(pool, user_id).await?;
        ProjectListing::Grouped(group_by_stage(projects, &slugs))
    } else {
        ProjectListing::Flat(projects)
    };

    Ok(ResponseJson(ApiResponse::success(ProjectsResponse {
        grouped,
        projects,
    })))
}

/// POST /api/projects
pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    axum::Json(payload): axum::Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("project name is required"));
    }

    let pool = &deployment.db().pool;
    let stage = match payload.stage.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => {
            ensure_known_stage(pool, user_id, slug).await?;
            slug.to_string()
        }
        None => Stage::default_slug(pool, user_id).await?,
    };
    for team_id in payload.linked_teams() {
        ensure_team_access(pool, user_id, team_id).await?;
    }

    let project = Project::create(pool, user_id, &payload, &stage, Uuid::new_v4()).await?;
    info!(%user_id, project_id = %project.id, stage = %project.stage, "Project created");

    deployment
        .track_if_analytics_allowed(
            "project_created",
            serde_json::json!({
                "project_id": project.id.to_string(),
                "stage": &project.stage,
                "milestones": payload.milestones.len(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(project)))
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ProjectDetails>>, ApiError> {
    let details = Project::find_details(&deployment.db().pool, user_id, project_id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

/// PUT /api/projects/{id}
/// Partial update; `{ "is_archived": true }` archives the project.
pub async fn update_project(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("project name cannot be blank"));
    }

    let pool = &deployment.db().pool;
    if let Some(team_id) = payload.team_id {
        ensure_team_access(pool, user_id, team_id).await?;
    }

    let project = Project::update(pool, user_id, project_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("project"))?;

    if payload.is_archived == Some(true) {
        info!(%user_id, %project_id, "Project archived");
        deployment
            .track_if_analytics_allowed(
                "project_archived",
                serde_json::json!({
                    "project_id": project_id.to_string(),
                }),
            )
            .await;
    }

    Ok(ResponseJson(ApiResponse::success(project)))
}

/// PUT /api/projects/{id}/stage
pub async fn update_project_stage(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateProjectStage>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let pool = &deployment.db().pool;
    let slug = payload.stage.trim();
    ensure_known_stage(pool, user_id, slug).await?;

    let project = Project::update_stage(pool, user_id, project_id, slug)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    debug!(%user_id, %project_id, stage = slug, "Project stage updated");

    Ok(ResponseJson(ApiResponse::success(project)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/projects", get(get_projects).post(create_project))
        .route("/projects/{id}", get(get_project).put(update_project))
        .route("/projects/{id}/stage", put(update_project_stage))
}
