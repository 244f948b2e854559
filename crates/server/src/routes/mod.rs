use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::DeploymentImpl;

pub mod ai;
pub mod contacts;
pub mod health;
pub mod projects;
pub mod stages;
pub mod teams;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router(&deployment))
        .merge(stages::router(&deployment))
        .merge(projects::router(&deployment))
        .merge(teams::router(&deployment))
        .merge(contacts::router(&deployment))
        .merge(ai::router(&deployment));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(deployment)
}
