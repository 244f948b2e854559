//! Routes for the caller's pipeline stages.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::stage::{CreateStage, Stage, StageRemoval, StagesResponse, UpdateStage, slugify};
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, deployment::Deployment, error::ApiError, middleware::RequestUser};

/// GET /api/stages
pub async fn get_stages(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
) -> Result<ResponseJson<ApiResponse<StagesResponse>>, ApiError> {
    let stages = Stage::find_by_user(&deployment.db().pool, user_id).await?;
    Ok(ResponseJson(ApiResponse::success(StagesResponse { stages })))
}

/// POST /api/stages
pub async fn create_stage(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    axum::Json(mut payload): axum::Json<CreateStage>,
) -> Result<ResponseJson<ApiResponse<Stage>>, ApiError> {
    payload.name = payload.name.trim().to_string();
    if payload.name.is_empty() {
        return Err(ApiError::bad_request("stage name is required"));
    }

    let slug = slugify(payload.slug.as_deref().unwrap_or(&payload.name));
    if slug.is_empty() {
        return Err(ApiError::bad_request("stage slug must contain letters or digits"));
    }

    let pool = &deployment.db().pool;
    if Stage::is_known_slug(pool, user_id, &slug).await? {
        return Err(ApiError::conflict(format!("stage '{slug}' already exists")));
    }

    let stage = Stage::create(pool, user_id, &payload, &slug).await?;
    info!(%user_id, slug = %stage.slug, "Stage created");

    deployment
        .track_if_analytics_allowed(
            "stage_created",
            serde_json::json!({
                "stage_id": stage.id.to_string(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(stage)))
}

/// PUT /api/stages/{id}
pub async fn update_stage(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(stage_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateStage>,
) -> Result<ResponseJson<ApiResponse<Stage>>, ApiError> {
    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("stage name cannot be blank"));
    }

    let stage = Stage::update(&deployment.db().pool, user_id, stage_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("stage"))?;
    Ok(ResponseJson(ApiResponse::success(stage)))
}

/// DELETE /api/stages/{id}
///
/// Refuses to remove the caller's last stage, or a stage that still holds active projects.
pub async fn delete_stage(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(stage_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let slug = match Stage::delete(&deployment.db().pool, user_id, stage_id).await? {
        StageRemoval::Removed { slug } => slug,
        StageRemoval::NotFound => return Err(ApiError::NotFound("stage")),
        StageRemoval::LastStage => return Err(ApiError::conflict("cannot delete the last stage")),
        StageRemoval::InUse { slug, projects } => {
            return Err(ApiError::conflict(format!(
                "stage '{slug}' still holds {projects} project(s)"
            )));
        }
    };
    info!(%user_id, %slug, "Stage deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/stages", get(get_stages).post(create_stage))
        .route("/stages/{id}", put(update_stage).delete(delete_stage))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use uuid::Uuid;

    use crate::routes::test_support::{app, send};

    #[tokio::test]
    async fn requires_identity() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/api/stages", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn create_derives_slug_and_rejects_duplicates() {
        let app = app().await;
        let user = Some(Uuid::new_v4());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/stages",
            user,
            Some(json!({ "name": "Proposal Sent", "is_default": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["slug"], "proposal_sent");
        assert_eq!(body["data"]["is_default"], true);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/stages",
            user,
            Some(json!({ "name": "proposal sent" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // The built-in columns become real rows alongside the first custom stage.
        let (_, body) = send(&app, Method::GET, "/api/stages", user, None).await;
        let stages = body["data"]["stages"].as_array().unwrap();
        assert_eq!(stages.len(), 6);
        assert_eq!(stages.iter().filter(|s| s["is_default"] == true).count(), 1);

        let (status, _) = send(&app, Method::POST, "/api/stages", user, Some(json!({ "name": "Planning" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Invisible to everyone else.
        let (_, body) = send(&app, Method::GET, "/api/stages", Some(Uuid::new_v4()), None).await;
        assert!(body["data"]["stages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_stage_cannot_be_deleted() {
        let app = app().await;
        let user = Some(Uuid::new_v4());
        send(&app, Method::POST, "/api/stages", user, Some(json!({ "name": "Lead" }))).await;

        let (_, body) = send(&app, Method::GET, "/api/stages", user, None).await;
        let ids: Vec<String> = body["data"]["stages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap().to_string())
            .collect();
        let (last, rest) = ids.split_last().unwrap();

        for id in rest {
            let (status, _) = send(&app, Method::DELETE, &format!("/api/stages/{id}"), user, None).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(&app, Method::DELETE, &format!("/api/stages/{last}"), user, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "cannot delete the last stage");

        let (status, _) = send(&app, Method::DELETE, &format!("/api/stages/{}", Uuid::new_v4()), user, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_default_update_keeps_existing_default() {
        let app = app().await;
        let user = Some(Uuid::new_v4());
        send(
            &app,
            Method::POST,
            "/api/stages",
            user,
            Some(json!({ "name": "Lead", "is_default": true })),
        )
        .await;

        let uri = format!("/api/stages/{}", Uuid::new_v4());
        let (status, _) = send(&app, Method::PUT, &uri, user, Some(json!({ "is_default": true }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app, Method::GET, "/api/stages", user, None).await;
        let defaults: Vec<_> = body["data"]["stages"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|s| s["is_default"] == true)
            .map(|s| s["slug"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(defaults, vec!["lead".to_string()]);
    }

    #[tokio::test]
    async fn projects_in_builtin_columns_survive_first_custom_stage() {
        let app = app().await;
        let user = Some(Uuid::new_v4());

        let (_, project) = send(&app, Method::POST, "/api/projects", user, Some(json!({ "name": "Acme" }))).await;
        assert_eq!(project["data"]["stage"], "ideation");

        let (status, _) = send(&app, Method::POST, "/api/stages", user, Some(json!({ "name": "Lead" }))).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/api/projects/{}/stage", project["data"]["id"].as_str().unwrap());
        let (status, body) = send(&app, Method::PUT, &uri, user, Some(json!({ "stage": "planning" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["stage"], "planning");

        let (_, listing) = send(&app, Method::GET, "/api/projects", user, None).await;
        let grouped = listing["data"]["projects"].as_object().unwrap();
        for slug in ["ideation", "planning", "lead"] {
            assert!(grouped.contains_key(slug), "missing column {slug}");
        }
    }

    #[tokio::test]
    async fn stage_with_projects_cannot_be_deleted() {
        let app = app().await;
        let user = Some(Uuid::new_v4());

        let (_, lead) = send(&app, Method::POST, "/api/stages", user, Some(json!({ "name": "Lead" }))).await;
        send(&app, Method::POST, "/api/stages", user, Some(json!({ "name": "Won" }))).await;
        send(
            &app,
            Method::POST,
            "/api/projects",
            user,
            Some(json!({ "name": "Acme", "stage": "lead" })),
        )
        .await;

        let uri = format!("/api/stages/{}", lead["data"]["id"].as_str().unwrap());
        let (status, _) = send(&app, Method::DELETE, &uri, user, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn update_of_foreign_stage_is_not_found() {
        let app = app().await;
        let owner = Some(Uuid::new_v4());
        let (_, body) = send(&app, Method::POST, "/api/stages", owner, Some(json!({ "name": "Lead" }))).await;
        let uri = format!("/api/stages/{}", body["data"]["id"].as_str().unwrap());

        let (status, _) = send(&app, Method::PUT, &uri, Some(Uuid::new_v4()), Some(json!({ "color": "#000000" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::PUT, &uri, owner, Some(json!({ "color": "#000000" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["color"], "#000000");
        assert_eq!(body["data"]["name"], "Lead");
    }
}
