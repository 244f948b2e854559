use axum::{extract::FromRequestParts, http::request::Parts};
use services::services::board_api::USER_ID_HEADER;
use uuid::Uuid;

use crate::error::ApiError;

/// Caller identity from the `x-user-id` header set by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestUser(pub Uuid);

impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(RequestUser)
            .ok_or(ApiError::Unauthorized)
    }
}
