//! Remote contract the board engine consumes, and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use db::models::{
    project::{CreateProject, Project, ProjectsResponse, UpdateProject, UpdateProjectStage},
    stage::{Stage, StagesResponse},
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::project_suggestions::{SuggestionError, SuggestionSource};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Error)]
pub enum BoardApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("json error: {0}")]
    Serde(String),
}

/// Which projects the board shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilter {
    pub team_id: Option<Uuid>,
}

impl BoardFilter {
    pub fn team(team_id: Uuid) -> Self {
        Self {
            team_id: Some(team_id),
        }
    }
}

#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn fetch_stages(&self) -> Result<Vec<Stage>, BoardApiError>;

    async fn fetch_projects(&self, filter: &BoardFilter) -> Result<ProjectsResponse, BoardApiError>;

    async fn create_project(&self, draft: &CreateProject) -> Result<Project, BoardApiError>;

    async fn update_project_stage(&self, project_id: Uuid, stage: &str) -> Result<(), BoardApiError>;

    async fn archive_project(&self, project_id: Uuid) -> Result<(), BoardApiError>;
}

#[derive(Debug, Clone)]
pub struct BoardClientConfig {
    pub base_url: String,
    pub user_id: Uuid,
    pub timeout: Duration,
}

impl BoardClientConfig {
    pub fn new(base_url: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            base_url: base_url.into(),
            user_id,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Serialize)]
struct SuggestionRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionReply {
    pub text: String,
}

/// Talks to the `/api` routes of the server crate.
#[derive(Debug, Clone)]
pub struct HttpBoardApi {
    http: Client,
    base_url: String,
    user_id: Uuid,
}

impl HttpBoardApi {
    pub fn new(config: BoardClientConfig) -> Result<Self, BoardApiError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("pipeline-board/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BoardApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(USER_ID_HEADER, self.user_id.to_string())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BoardApiError> {
        let body: ApiResponse<T> = self.send_envelope(request).await?;
        body.into_data()
            .ok_or_else(|| BoardApiError::Serde("response carried no data".to_string()))
    }

    /// For calls whose response body is irrelevant beyond success.
    async fn send_unit(&self, request: RequestBuilder) -> Result<(), BoardApiError> {
        self.send_envelope::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn send_envelope<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, BoardApiError> {
        let res = self
            .authed(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<ApiResponse<serde_json::Value>>()
                .await
                .ok()
                .and_then(|body| body.message().map(str::to_string))
                .unwrap_or_default();
            debug!(status = status.as_u16(), message = %message, "Board API request failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED => BoardApiError::Unauthorized,
                StatusCode::NOT_FOUND => BoardApiError::NotFound,
                s => BoardApiError::Http {
                    status: s.as_u16(),
                    message,
                },
            });
        }

        let body = res
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| BoardApiError::Serde(e.to_string()))?;
        if !body.is_success() {
            return Err(BoardApiError::Rejected(
                body.message().unwrap_or("unknown error").to_string(),
            ));
        }
        Ok(body)
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn fetch_stages(&self) -> Result<Vec<Stage>, BoardApiError> {
        let body: StagesResponse = self.send(self.http.get(self.url("/stages"))).await?;
        Ok(body.stages)
    }

    async fn fetch_projects(&self, filter: &BoardFilter) -> Result<ProjectsResponse, BoardApiError> {
        let mut request = self
            .http
            .get(self.url("/projects"))
            .query(&[("grouped", "true")]);
        if let Some(team_id) = filter.team_id {
            request = request.query(&[("team_id", team_id.to_string())]);
        }
        self.send(request).await
    }

    async fn create_project(&self, draft: &CreateProject) -> Result<Project, BoardApiError> {
        self.send(self.http.post(self.url("/projects")).json(draft))
            .await
    }

    async fn update_project_stage(&self, project_id: Uuid, stage: &str) -> Result<(), BoardApiError> {
        let body = UpdateProjectStage {
            stage: stage.to_string(),
        };
        self.send_unit(
            self.http
                .put(self.url(&format!("/projects/{project_id}/stage")))
                .json(&body),
        )
        .await
    }

    async fn archive_project(&self, project_id: Uuid) -> Result<(), BoardApiError> {
        self.send_unit(
            self.http
                .put(self.url(&format!("/projects/{project_id}")))
                .json(&UpdateProject::archive()),
        )
        .await
    }
}

#[async_trait]
impl SuggestionSource for HttpBoardApi {
    async fn suggest(&self, prompt: &str) -> Result<String, SuggestionError> {
        let reply: SuggestionReply = self
            .send(
                self.http
                    .post(self.url("/ai/project-suggestions"))
                    .json(&SuggestionRequest { prompt }),
            )
            .await
            .map_err(|e| SuggestionError::Unavailable(e.to_string()))?;
        Ok(reply.text)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> BoardApiError {
    if e.is_timeout() {
        BoardApiError::Timeout
    } else {
        BoardApiError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::HeaderMap,
        routing::{get, post, put},
    };
    use db::models::project::ProjectListing;

    use super::*;
    use crate::services::test_support::{project, stage};

    const USER: Uuid = Uuid::from_u128(7);

    fn board_server() -> Router {
        Router::new()
            .route(
                "/api/stages",
                get(|headers: HeaderMap| async move {
                    let caller = headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok());
                    if caller != Some(USER.to_string().as_str()) {
                        return (
                            StatusCode::UNAUTHORIZED,
                            Json(ApiResponse::<StagesResponse>::error("missing or invalid x-user-id header")),
                        );
                    }
                    let stages = vec![stage("lead", 0), stage("won", 1)];
                    (StatusCode::OK, Json(ApiResponse::success(StagesResponse { stages })))
                }),
            )
            .route(
                "/api/projects",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let owner = params.get("team_id").cloned().unwrap_or_else(|| "everyone".to_string());
                    let mut columns = BTreeMap::new();
                    columns.insert("lead".to_string(), vec![project(&owner, "lead")]);
                    columns.insert("won".to_string(), Vec::new());
                    Json(ApiResponse::success(ProjectsResponse {
                        grouped: params.get("grouped").is_some_and(|g| g == "true"),
                        projects: ProjectListing::Grouped(columns),
                    }))
                }),
            )
            .route(
                "/api/projects/{id}",
                put(|| async {
                    (StatusCode::NOT_FOUND, Json(ApiResponse::<()>::error("project not found")))
                }),
            )
            .route(
                "/api/projects/{id}/stage",
                put(|Path(id): Path<Uuid>, Json(body): Json<UpdateProjectStage>| async move {
                    match body.stage.as_str() {
                        _ if id.is_nil() => {
                            (StatusCode::NOT_FOUND, Json(ApiResponse::<()>::error("project not found")))
                        }
                        "bogus" => (StatusCode::OK, Json(ApiResponse::<()>::error("unknown stage 'bogus'"))),
                        "boom" => (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(ApiResponse::<()>::error("internal server error")),
                        ),
                        _ => (StatusCode::OK, Json(ApiResponse::success(()))),
                    }
                }),
            )
            .route(
                "/api/ai/project-suggestions",
                post(|| async { Json(ApiResponse::success(SuggestionReply { text: "{}".to_string() })) }),
            )
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    async fn client(user_id: Uuid) -> HttpBoardApi {
        let base_url = serve(board_server()).await;
        HttpBoardApi::new(BoardClientConfig::new(base_url, user_id)).unwrap()
    }

    #[tokio::test]
    async fn unwraps_stage_envelope_for_the_caller() {
        let api = client(USER).await;
        let stages = api.fetch_stages().await.unwrap();
        let slugs: Vec<_> = stages.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["lead", "won"]);

        let stranger = client(Uuid::new_v4()).await;
        assert!(matches!(stranger.fetch_stages().await, Err(BoardApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn grouped_listing_decodes_and_carries_team_filter() {
        let api = client(USER).await;

        let everyone = api.fetch_projects(&BoardFilter::default()).await.unwrap();
        assert!(everyone.grouped);
        let ProjectListing::Grouped(columns) = everyone.projects else {
            panic!("expected a grouped listing");
        };
        assert_eq!(columns["lead"][0].name, "everyone");
        assert!(columns["won"].is_empty());

        let team_id = Uuid::new_v4();
        let scoped = api.fetch_projects(&BoardFilter::team(team_id)).await.unwrap();
        let ProjectListing::Grouped(columns) = scoped.projects else {
            panic!("expected a grouped listing");
        };
        assert_eq!(columns["lead"][0].name, team_id.to_string());
    }

    #[tokio::test]
    async fn stage_update_maps_statuses_and_rejections() {
        let api = client(USER).await;
        let id = Uuid::new_v4();

        assert!(api.update_project_stage(id, "won").await.is_ok());
        assert!(matches!(
            api.update_project_stage(Uuid::nil(), "won").await,
            Err(BoardApiError::NotFound)
        ));
        match api.update_project_stage(id, "bogus").await {
            Err(BoardApiError::Rejected(message)) => assert_eq!(message, "unknown stage 'bogus'"),
            other => panic!("expected a rejection, got {other:?}"),
        }
        match api.update_project_stage(id, "boom").await {
            Err(BoardApiError::Http { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal server error");
            }
            other => panic!("expected an http error, got {other:?}"),
        }
        assert!(matches!(api.archive_project(id).await, Err(BoardApiError::NotFound)));
    }

    #[tokio::test]
    async fn suggestion_text_comes_back_unwrapped() {
        let api = client(USER).await;
        assert_eq!(api.suggest("bake sale").await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn closed_port_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpBoardApi::new(BoardClientConfig::new(format!("http://{addr}"), USER)).unwrap();
        assert!(matches!(api.fetch_stages().await, Err(BoardApiError::Transport(_))));
    }

    #[test]
    fn base_url_is_normalised() {
        let api = HttpBoardApi::new(BoardClientConfig::new(
            "http://localhost:3001/",
            Uuid::nil(),
        ))
        .unwrap();
        assert_eq!(api.url("/stages"), "http://localhost:3001/api/stages");
    }

    #[test]
    fn archive_body_only_sets_the_flag() {
        let body = serde_json::to_value(UpdateProject::archive()).unwrap();
        assert_eq!(body["is_archived"], true);
        assert!(body["name"].is_null());
    }
}
