use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::contact::{Contact, CreateContact, UpdateContact};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, deployment::Deployment, error::ApiError, middleware::RequestUser};

#[derive(Debug, Deserialize)]
pub struct ContactQuery {
    pub search: Option<String>,
}

/// GET /api/contacts?search=
pub async fn get_contacts(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Query(query): Query<ContactQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Contact>>>, ApiError> {
    let contacts =
        Contact::find_by_user(&deployment.db().pool, user_id, query.search.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(contacts)))
}

pub async fn create_contact(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    axum::Json(payload): axum::Json<CreateContact>,
) -> Result<ResponseJson<ApiResponse<Contact>>, ApiError> {
    if payload.first_name.trim().is_empty() {
        return Err(ApiError::bad_request("first name is required"));
    }
    let contact = Contact::create(&deployment.db().pool, user_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(contact)))
}

pub async fn get_contact(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(contact_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Contact>>, ApiError> {
    let contact = Contact::find_by_id(&deployment.db().pool, user_id, contact_id)
        .await?
        .ok_or(ApiError::NotFound("contact"))?;
    Ok(ResponseJson(ApiResponse::success(contact)))
}

pub async fn update_contact(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(contact_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateContact>,
) -> Result<ResponseJson<ApiResponse<Contact>>, ApiError> {
    if payload.first_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("first name cannot be blank"));
    }
    let contact = Contact::update(&deployment.db().pool, user_id, contact_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("contact"))?;
    Ok(ResponseJson(ApiResponse::success(contact)))
}

pub async fn delete_contact(
    State(deployment): State<DeploymentImpl>,
    RequestUser(user_id): RequestUser,
    Path(contact_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows = Contact::delete(&deployment.db().pool, user_id, contact_id).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("contact"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/contacts", get(get_contacts).post(create_contact))
        .route(
            "/contacts/{id}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}
